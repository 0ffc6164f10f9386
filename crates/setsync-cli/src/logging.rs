//! Logging setup

use std::fs::File;
use std::sync::Mutex;

use setsync_core::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize tracing from the configured level
///
/// Logs go to `config.log_file` when set, stderr otherwise. `RUST_LOG`
/// replaces the configured filter entirely.
pub fn init(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "setsync_core={},setsync_cli={}",
            config.log_level, config.log_level
        ))
    });

    let Some(log_path) = config.log_file.as_ref() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match File::create(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init();

    info!("Logging to {:?}", log_path);
}
