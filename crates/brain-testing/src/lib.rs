//! Internal testing utilities shared across the workspace: synthetic
//! transcript fixtures, a mock analyzer subprocess and a declarative
//! test world tying a store, a session directory and a mock analyzer
//! binary together.
//!
//! Not published; depended on only via `[dev-dependencies]`.

pub mod fixtures;
pub mod mock_analyzer;
pub mod world;

pub use fixtures::TranscriptBuilder;
pub use mock_analyzer::MockAnalyzer;
pub use world::TestWorld;
