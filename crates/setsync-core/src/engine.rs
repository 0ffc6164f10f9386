//! Coalescing sync engine
//!
//! Collapses bursts of edits to a set into a single write. Each set has at
//! most one scheduled write; scheduling again cancels the previous timer for
//! that set only. A commit-now cancels the timer and writes immediately.
//!
//! Values are read from the registry when the write fires, never when it is
//! scheduled, so the last edit always wins. Responses only drive the success
//! tint; they are never written back into the row.
//!
//! Must be used from within a tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::SetUpdater;
use crate::error::UpdateError;
use crate::models::{SetId, UpdateAck, UpdatePayload};
use crate::registry::RowRegistry;

/// Default quiet period before a provisional edit is written
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Default duration of the success tint
pub const DEFAULT_SUCCESS_TINT: Duration = Duration::from_millis(300);

/// Retry behaviour for failed writes
///
/// The default never retries: a failed write is logged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further attempt
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Engine timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub debounce: Duration,
    pub success_tint: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            success_tint: DEFAULT_SUCCESS_TINT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Sync state of one set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Nothing scheduled or in flight
    Idle,
    /// A debounced write is waiting (possibly behind one in flight)
    Scheduled,
    /// A write is on the wire
    InFlight,
}

/// Result of one commit
#[derive(Debug)]
pub enum CommitOutcome {
    /// Server accepted the write
    Saved(UpdateAck),
    /// Write failed; the row keeps its displayed values
    Failed(UpdateError),
    /// Row was detached before the write fired
    Skipped,
    /// A retry was dropped because a newer write was scheduled
    Superseded,
}

impl CommitOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, CommitOutcome::Saved(_))
    }
}

/// Events emitted by the engine
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A write was accepted
    Saved {
        set_id: SetId,
        payload: UpdatePayload,
        at: DateTime<Utc>,
    },
    /// A write failed and was dropped
    Failed {
        set_id: SetId,
        error: String,
        at: DateTime<Utc>,
    },
}

struct PendingWrite {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    pending: HashMap<SetId, PendingWrite>,
    in_flight: HashMap<SetId, usize>,
    /// Generation of the save that currently owns each set's tint
    tints: HashMap<SetId, u64>,
    next_generation: u64,
}

impl Slots {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

/// One in-flight count for a set
///
/// Released on drop, including when the updater panics or the task is
/// aborted.
struct Flight {
    inner: Arc<Inner>,
    id: SetId,
}

impl Flight {
    fn begin(inner: &Arc<Inner>, id: SetId) -> Self {
        *inner.lock().in_flight.entry(id.clone()).or_default() += 1;
        Self {
            inner: Arc::clone(inner),
            id,
        }
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.inner.end_flight(&self.id);
    }
}

struct Inner {
    registry: Arc<dyn RowRegistry>,
    updater: Arc<dyn SetUpdater>,
    settings: EngineSettings,
    slots: Mutex<Slots>,
    idle: Notify,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
}

/// Debouncing write coordinator for set rows
///
/// Cloning is cheap; clones share timers and the event channel.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
    event_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<SyncEvent>>>>,
}

impl SyncEngine {
    /// Create an engine with default settings
    pub fn new(registry: Arc<dyn RowRegistry>, updater: Arc<dyn SetUpdater>) -> Self {
        Self::with_settings(registry, updater, EngineSettings::default())
    }

    pub fn with_settings(
        registry: Arc<dyn RowRegistry>,
        updater: Arc<dyn SetUpdater>,
        settings: EngineSettings,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                registry,
                updater,
                settings,
                slots: Mutex::new(Slots::default()),
                idle: Notify::new(),
                event_tx,
            }),
            event_rx: Arc::new(Mutex::new(Some(event_rx))),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn registry(&self) -> &Arc<dyn RowRegistry> {
        &self.inner.registry
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.event_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Schedule a debounced write for a provisional edit
    ///
    /// Replaces any scheduled write for the same set. Other sets are not
    /// affected.
    pub fn schedule_write(&self, id: &SetId) {
        let mut slots = self.inner.lock();
        if let Some(previous) = slots.pending.remove(id) {
            previous.handle.abort();
            debug!("Set {}: rescheduled write", id);
        }

        slots.next_generation += 1;
        let generation = slots.next_generation;
        let inner = Arc::clone(&self.inner);
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.settings.debounce).await;
            if !inner.claim(&task_id, generation) {
                return;
            }
            debug!("Set {}: debounce elapsed", task_id);
            let flight = Flight {
                inner: Arc::clone(&inner),
                id: task_id,
            };
            inner.commit_counted(flight).await;
        });

        slots
            .pending
            .insert(id.clone(), PendingWrite { generation, handle });
    }

    /// Write a set immediately, cancelling any scheduled write for it
    ///
    /// Returns at once; the write runs in the background.
    pub fn commit_write(&self, id: &SetId) -> JoinHandle<CommitOutcome> {
        self.cancel(id);
        // Counted before spawning so `state` is InFlight from here on
        let flight = Flight::begin(&self.inner, id.clone());
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.commit_counted(flight).await })
    }

    /// Cancel the scheduled write for a set, if any
    ///
    /// Returns whether a write was cancelled. In-flight writes are not
    /// affected.
    pub fn cancel(&self, id: &SetId) -> bool {
        let removed = self.inner.lock().pending.remove(id);
        match removed {
            Some(pending) => {
                pending.handle.abort();
                self.inner.notify_if_idle();
                true
            }
            None => false,
        }
    }

    /// Drop every scheduled write without sending it
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingWrite> =
            self.inner.lock().pending.drain().map(|(_, p)| p).collect();
        for pending in &drained {
            pending.handle.abort();
        }
        self.inner.notify_if_idle();
        drained.len()
    }

    /// Commit every scheduled write now
    pub fn flush_pending(&self) -> Vec<JoinHandle<CommitOutcome>> {
        let mut ids: Vec<SetId> = self.inner.lock().pending.keys().cloned().collect();
        ids.sort();
        if !ids.is_empty() {
            info!("Flushing {} pending write(s)", ids.len());
        }
        ids.iter().map(|id| self.commit_write(id)).collect()
    }

    /// Number of scheduled (not yet fired) writes
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Wait until nothing is scheduled or in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn state(&self, id: &SetId) -> EntityState {
        let slots = self.inner.lock();
        if slots.pending.contains_key(id) {
            EntityState::Scheduled
        } else if slots.in_flight.get(id).copied().unwrap_or(0) > 0 {
            EntityState::InFlight
        } else {
            EntityState::Idle
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take ownership of a fired timer's slot
    ///
    /// Fails if the write was replaced or cancelled meanwhile. On success the
    /// write counts as in flight.
    fn claim(&self, id: &SetId, generation: u64) -> bool {
        let mut slots = self.lock();
        match slots.pending.get(id) {
            Some(p) if p.generation == generation => {
                slots.pending.remove(id);
                *slots.in_flight.entry(id.clone()).or_default() += 1;
                true
            }
            _ => false,
        }
    }

    fn end_flight(&self, id: &SetId) {
        {
            let mut slots = self.lock();
            if let Some(count) = slots.in_flight.get_mut(id) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    slots.in_flight.remove(id);
                }
            }
        }
        self.notify_if_idle();
    }

    fn notify_if_idle(&self) {
        if self.lock().is_idle() {
            self.idle.notify_waiters();
        }
    }

    fn has_pending(&self, id: &SetId) -> bool {
        self.lock().pending.contains_key(id)
    }

    /// Run a write whose in-flight count is already taken
    async fn commit_counted(&self, flight: Flight) -> CommitOutcome {
        let id = flight.id.clone();
        let outcome = self.send_with_retry(&id).await;

        // Report before leaving flight so `wait_idle` observers see every event
        let mut tint = None;
        match &outcome {
            CommitOutcome::Saved(_) => tint = Some(self.tint_on(&id)),
            CommitOutcome::Failed(e) => {
                warn!("Set {}: update failed: {}", id, e);
                let _ = self.event_tx.send(SyncEvent::Failed {
                    set_id: id.clone(),
                    error: e.to_string(),
                    at: Utc::now(),
                });
            }
            CommitOutcome::Skipped => debug!("Set {}: row detached, write skipped", id),
            CommitOutcome::Superseded => debug!("Set {}: retry superseded by newer edit", id),
        }
        drop(flight);

        if let Some(generation) = tint {
            tokio::time::sleep(self.settings.success_tint).await;
            self.tint_off(&id, generation);
        }

        outcome
    }

    /// Tint a saved row, taking the tint over from any earlier save
    fn tint_on(&self, id: &SetId) -> u64 {
        let mut slots = self.lock();
        slots.next_generation += 1;
        let generation = slots.next_generation;
        slots.tints.insert(id.clone(), generation);
        self.registry.set_success_tint(id, true);
        generation
    }

    /// Clear the tint unless a later save has taken it over
    fn tint_off(&self, id: &SetId, generation: u64) {
        let mut slots = self.lock();
        if slots.tints.get(id) == Some(&generation) {
            slots.tints.remove(id);
            self.registry.set_success_tint(id, false);
        }
    }

    async fn send_with_retry(&self, id: &SetId) -> CommitOutcome {
        let mut attempt = 0;
        loop {
            // Re-read on every attempt so a retry never sends stale values
            let Some(row) = self.registry.snapshot(id) else {
                return CommitOutcome::Skipped;
            };
            let payload = row.payload();

            match self.updater.update_set(id, &payload).await {
                Ok(ack) => {
                    info!("Set {}: saved", id);
                    let _ = self.event_tx.send(SyncEvent::Saved {
                        set_id: id.clone(),
                        payload,
                        at: Utc::now(),
                    });
                    return CommitOutcome::Saved(ack);
                }
                Err(e) if e.is_transient() && attempt < self.settings.retry.max_retries => {
                    attempt += 1;
                    let delay = self.settings.retry.delay(attempt);
                    warn!(
                        "Set {}: update failed ({}), retry {}/{} in {:?}",
                        id, e, attempt, self.settings.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                    if self.has_pending(id) {
                        return CommitOutcome::Superseded;
                    }
                }
                Err(e) => return CommitOutcome::Failed(e),
            }
        }
    }
}
