//! Delete command handler

use anyhow::{Context, Result};

use setsync_core::{Config, HttpSetClient, SetId, SetUpdater};

use crate::output::Output;

/// Delete a set on the server
pub async fn delete(config: &Config, id: String, output: &Output) -> Result<()> {
    let client = HttpSetClient::new(&config.server_url, config.request_timeout())
        .context("Failed to build HTTP client")?;
    let set_id = SetId::from(id);

    client
        .delete_set(&set_id)
        .await
        .with_context(|| format!("Failed to delete set {}", set_id))?;

    output.success(&format!("Deleted set {}", set_id));
    Ok(())
}
