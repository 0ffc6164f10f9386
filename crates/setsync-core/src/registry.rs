//! Row registry
//!
//! Maps set identifiers to the row state the page currently shows. The sync
//! engine reads field values through it at fire time and drives the
//! transient style hooks; it never owns the rows.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};

use crate::models::{EditField, RowStyle, SetId, WorkoutSetRow};

/// Access to the rows rendered on the page
pub trait RowRegistry: Send + Sync {
    /// Current values of a row, or `None` if no such row is attached
    fn snapshot(&self, id: &SetId) -> Option<WorkoutSetRow>;

    /// Write a numeric field value. Returns `false` for an unknown row.
    fn apply_edit(&self, id: &SetId, field: EditField, value: Option<f64>) -> bool;

    /// Write the completion flag. Returns `false` for an unknown row.
    fn set_completed(&self, id: &SetId, completed: bool) -> bool;

    fn set_success_tint(&self, id: &SetId, on: bool);

    fn set_de_emphasized(&self, id: &SetId, on: bool);

    fn style(&self, id: &SetId) -> Option<RowStyle>;

    fn contains(&self, id: &SetId) -> bool {
        self.snapshot(id).is_some()
    }
}

/// Rep count for a whole, in-range value; anything else clears the field
fn whole_reps(value: f64) -> Option<u32> {
    let in_range = (0.0..=f64::from(u32::MAX)).contains(&value);
    (in_range && value.fract() == 0.0).then_some(value as u32)
}

#[derive(Debug, Clone)]
struct Entry {
    row: WorkoutSetRow,
    style: RowStyle,
}

/// In-memory registry shared between the watcher and the engine
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    rows: Mutex<HashMap<SetId, Entry>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from rows; completed rows start de-emphasized
    pub fn from_rows(rows: impl IntoIterator<Item = WorkoutSetRow>) -> Self {
        let registry = Self::new();
        for row in rows {
            registry.insert(row);
        }
        registry
    }

    /// Load rows from a JSON array
    pub fn load_json(json: &str) -> Result<Self> {
        let rows: Vec<WorkoutSetRow> =
            serde_json::from_str(json).context("Failed to parse rows JSON")?;
        Ok(Self::from_rows(rows))
    }

    /// Load rows from a JSON file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rows file: {:?}", path))?;
        Self::load_json(&content).with_context(|| format!("Invalid rows file: {:?}", path))
    }

    /// Attach a row, replacing any row with the same id
    pub fn insert(&self, row: WorkoutSetRow) {
        let style = RowStyle {
            success_tint: false,
            de_emphasized: row.is_completed,
        };
        self.lock().insert(row.set_id.clone(), Entry { row, style });
    }

    /// Detach a row
    pub fn remove(&self, id: &SetId) -> Option<WorkoutSetRow> {
        self.lock().remove(id).map(|e| e.row)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All attached ids, sorted
    pub fn ids(&self) -> Vec<SetId> {
        let mut ids: Vec<SetId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SetId, Entry>> {
        // A panic while holding the lock cannot leave a row half-written.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RowRegistry for MemoryRegistry {
    fn snapshot(&self, id: &SetId) -> Option<WorkoutSetRow> {
        self.lock().get(id).map(|e| e.row.clone())
    }

    fn apply_edit(&self, id: &SetId, field: EditField, value: Option<f64>) -> bool {
        let mut rows = self.lock();
        let Some(entry) = rows.get_mut(id) else {
            return false;
        };
        match field {
            EditField::Weight => entry.row.weight = value,
            EditField::Reps => entry.row.reps = value.and_then(whole_reps),
        }
        true
    }

    fn set_completed(&self, id: &SetId, completed: bool) -> bool {
        let mut rows = self.lock();
        let Some(entry) = rows.get_mut(id) else {
            return false;
        };
        entry.row.is_completed = completed;
        true
    }

    fn set_success_tint(&self, id: &SetId, on: bool) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.style.success_tint = on;
        }
    }

    fn set_de_emphasized(&self, id: &SetId, on: bool) {
        if let Some(entry) = self.lock().get_mut(id) {
            entry.style.de_emphasized = on;
        }
    }

    fn style(&self, id: &SetId) -> Option<RowStyle> {
        self.lock().get(id).map(|e| e.style)
    }

    fn contains(&self, id: &SetId) -> bool {
        self.lock().contains_key(id)
    }
}
