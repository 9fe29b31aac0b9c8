//! Daemon lifecycle: configuration, the PID-file guard, and the
//! supervisor that wires the watcher, worker pool and consolidation
//! scheduler to one shared [`brain_store::Store`] (§5).

mod config;
mod error;
mod pidfile;
mod supervisor;

pub use config::{Config, DaemonConfig, EmbeddingProvider, HubConfig, QueryConfig, RsyncOptions, SpokeConfig, SyncMethod};
pub use error::{Error, Result};
pub use pidfile::PidFile;
pub use supervisor::Daemon;
