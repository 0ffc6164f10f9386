//! Edit watcher
//!
//! Turns raw row events into engine calls. Keystrokes are provisional and
//! get debounced; blur and completion toggles end the edit and are written
//! at once.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::{CommitOutcome, SyncEngine};
use crate::models::{EditField, SetId};
use crate::registry::RowRegistry;

/// A raw UI event on a set row
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Field text changed (each keystroke)
    Input {
        set_id: SetId,
        field: EditField,
        value: String,
    },
    /// Field lost focus
    Blur { set_id: SetId, field: EditField },
    /// Completion checkbox toggled
    Toggle { set_id: SetId, checked: bool },
}

impl RawEvent {
    pub fn set_id(&self) -> &SetId {
        match self {
            RawEvent::Input { set_id, .. }
            | RawEvent::Blur { set_id, .. }
            | RawEvent::Toggle { set_id, .. } => set_id,
        }
    }
}

/// How an event is treated by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditClass {
    /// Still typing; debounce
    Provisional,
    /// Edit session over; write now
    CommitNow,
}

/// Classify a raw event
pub fn classify(event: &RawEvent) -> EditClass {
    match event {
        RawEvent::Input { .. } => EditClass::Provisional,
        RawEvent::Blur { .. } | RawEvent::Toggle { .. } => EditClass::CommitNow,
    }
}

/// What the watcher did with an event
#[derive(Debug)]
pub enum WatchOutcome {
    /// Row not found; event dropped
    Ignored,
    /// Debounced write scheduled
    Scheduled,
    /// Immediate write started
    Committed(JoinHandle<CommitOutcome>),
}

/// Keep only digits and the decimal point, as number inputs do
pub fn sanitize_number(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

/// Parse field text into a value; empty or malformed text clears the field
pub fn parse_field_value(field: EditField, raw: &str) -> Option<f64> {
    let cleaned = sanitize_number(raw);
    if cleaned.is_empty() {
        return None;
    }
    match field {
        EditField::Weight => cleaned.parse::<f64>().ok().filter(|v| v.is_finite()),
        EditField::Reps => cleaned.parse::<u32>().ok().map(f64::from),
    }
}

/// Feeds row events into a [`SyncEngine`]
#[derive(Clone)]
pub struct EditWatcher {
    registry: Arc<dyn RowRegistry>,
    engine: SyncEngine,
}

impl EditWatcher {
    pub fn new(registry: Arc<dyn RowRegistry>, engine: SyncEngine) -> Self {
        Self { registry, engine }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Handle one event
    ///
    /// Never fails: events for unknown rows are dropped, and write failures
    /// are reported through the engine's events.
    pub fn handle(&self, event: RawEvent) -> WatchOutcome {
        if !self.registry.contains(event.set_id()) {
            debug!("Ignoring event for unknown set {}", event.set_id());
            return WatchOutcome::Ignored;
        }

        match event {
            RawEvent::Input {
                set_id,
                field,
                value,
            } => {
                let parsed = parse_field_value(field, &value);
                if !self.registry.apply_edit(&set_id, field, parsed) {
                    return WatchOutcome::Ignored;
                }
                self.engine.schedule_write(&set_id);
                WatchOutcome::Scheduled
            }
            RawEvent::Blur { set_id, field } => {
                debug!("Set {}: {} blurred", set_id, field);
                WatchOutcome::Committed(self.engine.commit_write(&set_id))
            }
            RawEvent::Toggle { set_id, checked } => {
                if !self.registry.set_completed(&set_id, checked) {
                    return WatchOutcome::Ignored;
                }
                // Visual state follows the checkbox regardless of the write
                self.registry.set_de_emphasized(&set_id, checked);
                WatchOutcome::Committed(self.engine.commit_write(&set_id))
            }
        }
    }
}
