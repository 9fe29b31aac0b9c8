//! The analyzer subprocess adapter (C4): invocation contract, failure
//! classification and backoff. Never touches the graph store.

mod backoff;
mod classify;
mod embedding;
mod error;
mod invoke;
mod log;

pub use backoff::backoff;
pub use classify::{classify, FailureClass, ProcessOutcome};
pub use embedding::{EmbeddingClient, EmbeddingConfig, EmbeddingProviderKind, INPUT_SCHEMA_VERSION};
pub use error::{Error, Result};
pub use invoke::{AnalyzerAdapter, AnalyzerRequest};
