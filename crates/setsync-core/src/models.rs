//! Data models for setsync
//!
//! Defines the workout-set row as the page sees it, the payload sent to the
//! set-update endpoint, and the endpoint's acknowledgement.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label prefix that marks a warmup set (e.g. "W1")
pub const WARMUP_MARKER: char = 'W';

/// Opaque identifier of a persisted workout set
///
/// Accepts both JSON strings and integers, since the server keys sets by
/// integer while pages may carry them as text. Integer ids order numerically
/// and sort before any other ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SetId(String);

impl<'de> Deserialize<'de> for SetId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => SetId(s),
            Raw::Int(n) => SetId(n.to_string()),
        })
    }
}

impl SetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn as_number(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl Ord for SetId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for SetId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for SetId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for SetId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Editable numeric field of a set row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditField {
    Weight,
    Reps,
}

impl EditField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditField::Weight => "weight",
            EditField::Reps => "reps",
        }
    }
}

impl fmt::Display for EditField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EditField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "weight" => Ok(EditField::Weight),
            "reps" => Ok(EditField::Reps),
            other => Err(format!("unknown field '{}' (expected weight or reps)", other)),
        }
    }
}

/// One rendered workout set
///
/// Rows are owned by the page (see [`crate::registry::RowRegistry`]); the
/// sync engine only reads them, apart from transient style flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSetRow {
    pub set_id: SetId,
    /// Position within the exercise, warmups first
    #[serde(default)]
    pub set_number: Option<u32>,
    /// Display label; a leading `W` marks a warmup
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub rpe: Option<f32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WorkoutSetRow {
    /// Create an empty row for the given set
    pub fn new(set_id: impl Into<SetId>) -> Self {
        Self {
            set_id: set_id.into(),
            set_number: None,
            label: String::new(),
            weight: None,
            reps: None,
            is_completed: false,
            rpe: None,
            notes: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Whether this row is a warmup set, derived from its label marker
    pub fn is_warmup(&self) -> bool {
        self.label
            .trim_start()
            .chars()
            .next()
            .is_some_and(|c| c.eq_ignore_ascii_case(&WARMUP_MARKER))
    }

    /// Build the payload for the set-update endpoint from current values
    pub fn payload(&self) -> UpdatePayload {
        UpdatePayload {
            weight: self.weight,
            reps: self.reps,
            is_completed: self.is_completed,
            rpe: self.rpe,
            notes: self.notes.clone(),
        }
    }
}

/// Transient visual state of a row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowStyle {
    /// Brief acknowledgement after a successful save
    pub success_tint: bool,
    /// Completed sets are drawn de-emphasized
    pub de_emphasized: bool,
}

/// Body of a set update
///
/// The endpoint replaces every mutable field of the set, so `rpe` and
/// `notes` are sent as well to keep them from being cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatePayload {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub is_completed: bool,
    pub rpe: Option<f32>,
    pub notes: Option<String>,
}

/// Success response of the set-update endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateAck {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub set_id: Option<serde_json::Value>,
}
