//! Transcript parsing (C1) and segment boundary detection (C2).
//!
//! This crate is pure: no subprocess spawning, no database, no
//! network. It turns a transcript file into a [`brain_types::Session`]
//! and a session into an ordered list of [`brain_types::Segment`]s.

mod detector;
mod error;
mod parser;
mod wire;

pub use detector::{detect_boundaries, detect_handoff, segments_from_boundaries, Boundary, DetectorConfig};
pub use error::{Error, Result};
pub use parser::parse_session_file;
