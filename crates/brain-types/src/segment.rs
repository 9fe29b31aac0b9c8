use crate::entry::EntryId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The boundary kinds the detector recognizes, in the order §4.2 lists
/// them. `Start` is synthetic and always opens the first segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Start,
    BranchSummary,
    TreeJump,
    Compaction,
    Fork,
    Resume,
    /// Reserved; the detection heuristic is not defined upstream (§9).
    /// `brain-core`'s detector always reports this kind as absent.
    Handoff,
}

/// The `(session-file, start-entry-id, end-entry-id)` triple that
/// identifies a segment and, via [`crate::derive_node_id`], the node
/// derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTriple {
    pub session_file: PathBuf,
    pub start: EntryId,
    pub end: EntryId,
}

/// A contiguous ancestor-chain of entries within one session, the unit
/// of analysis (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub triple: SegmentTriple,
    pub entry_count: usize,
    /// The boundary that opened this segment.
    pub opened_by: BoundaryKind,
}

impl Segment {
    pub fn session_file(&self) -> &std::path::Path {
        &self.triple.session_file
    }

    pub fn start(&self) -> &EntryId {
        &self.triple.start
    }

    pub fn end(&self) -> &EntryId {
        &self.triple.end
    }
}
