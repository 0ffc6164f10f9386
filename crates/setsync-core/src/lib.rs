//! setsync Core Library
//!
//! Autosave for in-progress workout-set edits. Keystrokes on a set's weight
//! or reps are debounced into a single update per set; blur and completion
//! toggles write immediately. The server is the system of record.
//!
//! # Architecture
//!
//! - **Edit watcher**: classifies row events as provisional or commit-now
//! - **Sync engine**: one cancellable timer per set, write-on-fire
//! - **Row registry**: the page's rows, read at fire time
//!
//! # Quick Start
//!
//! ```text
//! let registry = Arc::new(MemoryRegistry::from_rows(rows));
//! let client = Arc::new(HttpSetClient::new(&config.server_url, config.request_timeout())?);
//! let engine = SyncEngine::with_settings(registry.clone(), client, config.engine_settings());
//! let watcher = EditWatcher::new(registry, engine);
//!
//! watcher.handle(RawEvent::Input { set_id, field: EditField::Weight, value: "105".into() });
//! ```
//!
//! # Modules
//!
//! - `models`: Set rows, update payloads
//! - `registry`: Row lookup and style hooks
//! - `watcher`: Event classification
//! - `engine`: Debounce and write coordination
//! - `client`: Set-update endpoint
//! - `config`: Application configuration

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod registry;
pub mod watcher;

pub use client::{HttpSetClient, SetUpdater};
pub use config::Config;
pub use engine::{CommitOutcome, EngineSettings, EntityState, RetryPolicy, SyncEngine, SyncEvent};
pub use error::UpdateError;
pub use models::{EditField, RowStyle, SetId, UpdateAck, UpdatePayload, WorkoutSetRow};
pub use registry::{MemoryRegistry, RowRegistry};
pub use watcher::{classify, EditClass, EditWatcher, RawEvent, WatchOutcome};
