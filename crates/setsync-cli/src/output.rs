//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use setsync_core::{EntityState, RowStyle, SyncEvent, UpdatePayload, WorkoutSetRow};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// A row as shown by `show`
pub struct RowView {
    pub row: WorkoutSetRow,
    pub style: RowStyle,
    pub state: EntityState,
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a sync event from the engine
    pub fn print_event(&self, event: &SyncEvent) {
        match self.format {
            OutputFormat::Human => match event {
                SyncEvent::Saved {
                    set_id,
                    payload,
                    at,
                } => {
                    println!(
                        "✓ [{}] set {} saved ({})",
                        at.format("%H:%M:%S"),
                        set_id,
                        describe_payload(payload)
                    );
                }
                SyncEvent::Failed { set_id, error, at } => {
                    println!("⚠ [{}] set {} not saved: {}", at.format("%H:%M:%S"), set_id, error);
                }
            },
            OutputFormat::Json => {
                let value = match event {
                    SyncEvent::Saved {
                        set_id,
                        payload,
                        at,
                    } => serde_json::json!({
                        "event": "saved",
                        "set_id": set_id,
                        "payload": payload,
                        "at": at.to_rfc3339()
                    }),
                    SyncEvent::Failed { set_id, error, at } => serde_json::json!({
                        "event": "failed",
                        "set_id": set_id,
                        "error": error,
                        "at": at.to_rfc3339()
                    }),
                };
                println!("{}", value);
            }
            OutputFormat::Quiet => {
                // Failures still matter in quiet mode
                if let SyncEvent::Failed { set_id, error, .. } = event {
                    eprintln!("{}: {}", set_id, error);
                }
            }
        }
    }

    /// Print rows with their sync state
    pub fn print_rows(&self, rows: &[RowView]) {
        match self.format {
            OutputFormat::Human => {
                if rows.is_empty() {
                    println!("No rows.");
                    return;
                }
                for view in rows {
                    let row = &view.row;
                    let mut flags = Vec::new();
                    if row.is_warmup() {
                        flags.push("warmup");
                    }
                    if view.style.de_emphasized {
                        flags.push("done");
                    }
                    if view.style.success_tint {
                        flags.push("saved");
                    }
                    println!(
                        "{:>6} | {:<4} | {:>7} kg | {:>4} reps | {:<9} | {}",
                        row.set_id,
                        truncate(&row.label, 4),
                        fmt_opt(row.weight),
                        fmt_opt(row.reps),
                        state_label(view.state),
                        flags.join(",")
                    );
                }
            }
            OutputFormat::Json => {
                let json: Vec<_> = rows
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "row": v.row,
                            "style": v.style,
                            "state": state_label(v.state)
                        })
                    })
                    .collect();
                println!("{}", serde_json::Value::Array(json));
            }
            OutputFormat::Quiet => {
                for view in rows {
                    println!("{}", view.row.set_id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a problem with user input (always shown)
    pub fn warn(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "error", "message": message})
                );
            }
            OutputFormat::Human | OutputFormat::Quiet => eprintln!("⚠ {}", message),
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn state_label(state: EntityState) -> &'static str {
    match state {
        EntityState::Idle => "idle",
        EntityState::Scheduled => "scheduled",
        EntityState::InFlight => "in-flight",
    }
}

fn describe_payload(payload: &UpdatePayload) -> String {
    format!(
        "weight={}, reps={}, completed={}",
        fmt_opt(payload.weight),
        fmt_opt(payload.reps),
        if payload.is_completed { "yes" } else { "no" }
    )
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to max length in characters
fn truncate(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}
