//! setsync CLI
//!
//! Command-line interface for setsync - autosave of workout-set edits.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use setsync_core::Config;

mod commands;
mod logging;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "setsync")]
#[command(about = "setsync - Debounced autosave for workout sets")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an editing session: read row events from stdin and autosave them
    Run {
        /// JSON file with the rows on the page
        #[arg(short, long)]
        rows: PathBuf,
    },
    /// Save one set immediately
    Push {
        /// Set ID
        id: String,
        #[arg(short, long)]
        weight: Option<f64>,
        #[arg(short, long)]
        reps: Option<u32>,
        /// Mark the set completed
        #[arg(short, long)]
        completed: bool,
        #[arg(long)]
        rpe: Option<f32>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a set on the server
    #[command(alias = "rm")]
    Delete {
        /// Set ID
        id: String,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, debounce_ms, max_retries, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work on the file as-is
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config = Config::load_with_cli_override(config_path)?;
    logging::init(&config);

    match cli.command {
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Run { rows } => commands::run::run(&config, &rows, &output).await,
        Commands::Push {
            id,
            weight,
            reps,
            completed,
            rpe,
            notes,
        } => {
            let values = commands::push::PushValues {
                weight,
                reps,
                completed,
                rpe,
                notes,
            };
            commands::push::push(&config, id, values, &output).await
        }
        Commands::Delete { id } => commands::delete::delete(&config, id, &output).await,
    }
}
