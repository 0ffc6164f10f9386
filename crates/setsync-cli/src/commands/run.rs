//! Editing session
//!
//! Reads row events from stdin, one per line, and feeds them to the edit
//! watcher:
//!
//! ```text
//! input <id> <weight|reps> <value>   keystroke (debounced)
//! blur <id> <weight|reps>            field lost focus (saves now)
//! toggle <id> <on|off>               completion checkbox (saves now)
//! show [id]                          print rows
//! flush                              save everything scheduled
//! quit
//! ```
//!
//! Pending writes are flushed when input ends.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use setsync_core::{
    Config, EditField, EditWatcher, EngineSettings, HttpSetClient, MemoryRegistry, RawEvent,
    RowRegistry, SetId, SetUpdater, SyncEngine, WatchOutcome,
};

use crate::output::{Output, RowView};

/// One parsed session line
#[derive(Debug, PartialEq)]
pub enum SessionCommand {
    Event(RawEvent),
    Show(Option<SetId>),
    Flush,
    Quit,
    /// Blank line or `#` comment
    Nothing,
}

/// Parse a session line
pub fn parse_line(line: &str) -> Result<SessionCommand, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(SessionCommand::Nothing);
    }

    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    match verb.as_str() {
        "input" => {
            let (id, field) = id_and_field(&verb, &args)?;
            // A missing value clears the field
            let value = args[2..].join(" ");
            Ok(SessionCommand::Event(RawEvent::Input {
                set_id: id,
                field,
                value,
            }))
        }
        "blur" => {
            let (id, field) = id_and_field(&verb, &args)?;
            Ok(SessionCommand::Event(RawEvent::Blur { set_id: id, field }))
        }
        "toggle" => {
            let [id, state] = args[..] else {
                return Err("usage: toggle <id> <on|off>".to_string());
            };
            let checked = match state.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" | "yes" => true,
                "off" | "false" | "0" | "no" => false,
                other => return Err(format!("invalid toggle state '{}'", other)),
            };
            Ok(SessionCommand::Event(RawEvent::Toggle {
                set_id: SetId::from(id),
                checked,
            }))
        }
        "show" => match args[..] {
            [] => Ok(SessionCommand::Show(None)),
            [id] => Ok(SessionCommand::Show(Some(SetId::from(id)))),
            _ => Err("usage: show [id]".to_string()),
        },
        "flush" => Ok(SessionCommand::Flush),
        "quit" | "exit" => Ok(SessionCommand::Quit),
        other => Err(format!("unknown command '{}'", other)),
    }
}

fn id_and_field(verb: &str, args: &[&str]) -> Result<(SetId, EditField), String> {
    if args.len() < 2 {
        return Err(format!("usage: {} <id> <weight|reps>", verb));
    }
    let field = args[1].parse::<EditField>()?;
    Ok((SetId::from(args[0]), field))
}

/// Run an editing session on stdin against the configured server
pub async fn run(config: &Config, rows_path: &Path, output: &Output) -> Result<()> {
    let registry = Arc::new(MemoryRegistry::load_file(rows_path)?);
    let client = HttpSetClient::new(&config.server_url, config.request_timeout())
        .context("Failed to build HTTP client")?;

    info!(
        "Session started: {} row(s), server {}",
        registry.len(),
        config.server_url
    );
    output.message(&format!(
        "Loaded {} row(s) from {}",
        registry.len(),
        rows_path.display()
    ));

    let stdin = BufReader::new(tokio::io::stdin());
    let session = Session::new(registry, Arc::new(client), config.engine_settings());
    session.drive(stdin, output).await
}

/// Rows, engine and watcher for one editing session
pub struct Session {
    registry: Arc<MemoryRegistry>,
    engine: SyncEngine,
    watcher: EditWatcher,
}

impl Session {
    pub fn new(
        registry: Arc<MemoryRegistry>,
        updater: Arc<dyn SetUpdater>,
        settings: EngineSettings,
    ) -> Self {
        let engine = SyncEngine::with_settings(registry.clone(), updater, settings);
        let watcher = EditWatcher::new(registry.clone(), engine.clone());
        Self {
            registry,
            engine,
            watcher,
        }
    }

    /// Feed session lines until EOF or `quit`, then flush and wait for every
    /// pending write
    pub async fn drive<R>(&self, input: R, output: &Output) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut events = self
            .engine
            .take_events()
            .context("Sync events already taken")?;
        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read session input")? else {
                        break;
                    };
                    match parse_line(&line) {
                        Ok(SessionCommand::Quit) => break,
                        Ok(command) => {
                            handle_command(command, &self.watcher, &self.registry, output)
                        }
                        Err(e) => output.warn(&e),
                    }
                }
                Some(event) = events.recv() => output.print_event(&event),
            }
        }

        self.engine.flush_pending();
        self.engine.wait_idle().await;
        while let Ok(event) = events.try_recv() {
            output.print_event(&event);
        }

        info!("Session ended");
        Ok(())
    }
}

fn handle_command(
    command: SessionCommand,
    watcher: &EditWatcher,
    registry: &MemoryRegistry,
    output: &Output,
) {
    match command {
        SessionCommand::Event(event) => {
            let id = event.set_id().clone();
            if let WatchOutcome::Ignored = watcher.handle(event) {
                output.warn(&format!("No row for set {}", id));
            }
        }
        SessionCommand::Show(id) => {
            let ids = match id {
                Some(id) => vec![id],
                None => registry.ids(),
            };
            let views: Vec<RowView> = ids
                .into_iter()
                .filter_map(|id| {
                    Some(RowView {
                        row: registry.snapshot(&id)?,
                        style: registry.style(&id)?,
                        state: watcher.engine().state(&id),
                    })
                })
                .collect();
            output.print_rows(&views);
        }
        SessionCommand::Flush => {
            let count = watcher.engine().flush_pending().len();
            output.message(&format!("Flushing {} pending write(s)", count));
        }
        SessionCommand::Quit | SessionCommand::Nothing => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use setsync_core::{UpdateAck, UpdateError, UpdatePayload, WorkoutSetRow};
    use tokio::io::AsyncWriteExt;

    use crate::output::OutputFormat;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(SetId, UpdatePayload)>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<(SetId, UpdatePayload)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SetUpdater for Recorder {
        fn update_set<'a>(
            &'a self,
            id: &'a SetId,
            payload: &'a UpdatePayload,
        ) -> BoxFuture<'a, Result<UpdateAck, UpdateError>> {
            self.calls.lock().unwrap().push((id.clone(), payload.clone()));
            async {
                Ok(UpdateAck {
                    message: "Set updated".to_string(),
                    set_id: None,
                })
            }
            .boxed()
        }

        fn delete_set<'a>(&'a self, _id: &'a SetId) -> BoxFuture<'a, Result<(), UpdateError>> {
            async { Ok(()) }.boxed()
        }
    }

    fn session(recorder: &Arc<Recorder>) -> Session {
        let registry = Arc::new(MemoryRegistry::from_rows([
            WorkoutSetRow::new(102i64),
            WorkoutSetRow::new(103i64),
        ]));
        Session::new(registry, recorder.clone(), EngineSettings::default())
    }

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_flushes_last_value_on_eof() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);
        let input: &[u8] = b"input 102 weight 100\ninput 102 weight 105\n";

        session.drive(input, &quiet()).await.unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, SetId::from(102i64));
        assert_eq!(calls[0].1.weight, Some(105.0));
        assert_eq!(session.engine.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_skips_bad_lines_and_stops_at_quit() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);
        let input: &[u8] = b"bogus line\n\
            input 999 weight 50\n\
            toggle 103 maybe\n\
            toggle 103 on\n\
            quit\n\
            input 102 weight 1\n";

        session.drive(input, &quiet()).await.unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, SetId::from(103i64));
        assert!(calls[0].1.is_completed);
        assert_eq!(session.registry.snapshot(&SetId::from(102i64)).unwrap().weight, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_debounce_fires_while_reading() {
        let recorder = Arc::new(Recorder::default());
        let session = session(&recorder);
        let output = quiet();
        let (reader, mut writer) = tokio::io::duplex(64);

        let drive = session.drive(BufReader::new(reader), &output);
        let feed = async {
            writer.write_all(b"input 102 reps 8\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert_eq!(recorder.calls().len(), 1);
            writer.write_all(b"blur 102 reps\n").await.unwrap();
            drop(writer);
        };
        let (result, ()) = tokio::join!(drive, feed);
        result.unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, p)| p.reps == Some(8)));
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(
            parse_line("input 12 weight 105").unwrap(),
            SessionCommand::Event(RawEvent::Input {
                set_id: SetId::from(12i64),
                field: EditField::Weight,
                value: "105".to_string(),
            })
        );

        // No value clears the field
        assert_eq!(
            parse_line("INPUT 12 reps").unwrap(),
            SessionCommand::Event(RawEvent::Input {
                set_id: SetId::from(12i64),
                field: EditField::Reps,
                value: String::new(),
            })
        );
    }

    #[test]
    fn test_parse_blur_and_toggle() {
        assert_eq!(
            parse_line("blur 3 reps").unwrap(),
            SessionCommand::Event(RawEvent::Blur {
                set_id: SetId::from(3i64),
                field: EditField::Reps,
            })
        );
        assert_eq!(
            parse_line("  toggle 3 on ").unwrap(),
            SessionCommand::Event(RawEvent::Toggle {
                set_id: SetId::from(3i64),
                checked: true,
            })
        );
        assert_eq!(
            parse_line("toggle 3 off").unwrap(),
            SessionCommand::Event(RawEvent::Toggle {
                set_id: SetId::from(3i64),
                checked: false,
            })
        );
    }

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(parse_line("").unwrap(), SessionCommand::Nothing);
        assert_eq!(parse_line("# warmups").unwrap(), SessionCommand::Nothing);
        assert_eq!(parse_line("show").unwrap(), SessionCommand::Show(None));
        assert_eq!(
            parse_line("show 7").unwrap(),
            SessionCommand::Show(Some(SetId::from(7i64)))
        );
        assert_eq!(parse_line("flush").unwrap(), SessionCommand::Flush);
        assert_eq!(parse_line("exit").unwrap(), SessionCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("input 12").is_err());
        assert!(parse_line("input 12 rpe 8").is_err());
        assert!(parse_line("toggle 3 maybe").is_err());
        assert!(parse_line("toggle 3").is_err());
        assert!(parse_line("jump 3").is_err());
    }
}
