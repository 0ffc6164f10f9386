//! Push command handler
//!
//! Saves one set right away, through the same engine a session uses.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use setsync_core::{
    CommitOutcome, Config, EngineSettings, HttpSetClient, MemoryRegistry, SetId, SyncEngine,
    WorkoutSetRow,
};

use crate::output::Output;

/// Field values given on the command line
#[derive(Debug, Default)]
pub struct PushValues {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub completed: bool,
    pub rpe: Option<f32>,
    pub notes: Option<String>,
}

impl PushValues {
    fn into_row(self, id: SetId) -> WorkoutSetRow {
        let mut row = WorkoutSetRow::new(id);
        row.weight = self.weight;
        row.reps = self.reps;
        row.is_completed = self.completed;
        row.rpe = self.rpe;
        row.notes = self.notes;
        row
    }
}

/// Save one set immediately
pub async fn push(config: &Config, id: String, values: PushValues, output: &Output) -> Result<()> {
    let set_id = SetId::from(id);
    let registry = Arc::new(MemoryRegistry::from_rows([values.into_row(set_id.clone())]));
    let client = HttpSetClient::new(&config.server_url, config.request_timeout())
        .context("Failed to build HTTP client")?;
    // No row to tint here
    let settings = EngineSettings {
        success_tint: Duration::ZERO,
        ..config.engine_settings()
    };
    let engine = SyncEngine::with_settings(registry, Arc::new(client), settings);

    let outcome = engine
        .commit_write(&set_id)
        .await
        .context("Save task panicked")?;

    match outcome {
        CommitOutcome::Saved(ack) => {
            let message = if ack.message.is_empty() {
                format!("Saved set {}", set_id)
            } else {
                format!("{} ({})", ack.message, set_id)
            };
            output.success(&message);
            Ok(())
        }
        CommitOutcome::Failed(e) => bail!("Failed to save set {}: {}", set_id, e),
        CommitOutcome::Skipped | CommitOutcome::Superseded => {
            bail!("Set {} was not saved", set_id)
        }
    }
}
