//! Relational graph store (C3) and durable job queue (C5).
//!
//! Blobs are the source of truth; the SQLite database is a rebuildable
//! projection kept current by [`Store::upsert_segment`]. The queue
//! lives in the same database and is reached via [`Store::queue`].

mod blobs;
mod consolidation;
mod db;
mod error;
mod queue;
mod records;
mod schema;
mod store;

pub use blobs::{blob_path, read_blob};
pub use consolidation::{DecayInputs, ReanalysisCandidate};
pub use db::Store;
pub use error::{Error, Result};
pub use queue::{JobInput, JobQueue, QueueCounts, DEFAULT_LEASE_MINUTES};
pub use records::{FtsMatch, NodeFilter, Page, SemanticMatch, Subgraph};
pub use schema::{capability_available, CAPABILITY_FTS};
