use brain_types::Outcome;
use chrono::{DateTime, Utc};

/// Filter for `search_by_filter` (§4.3). All fields are conjunctive;
/// `None` means "no constraint on this field".
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub project: Option<String>,
    pub outcome: Option<Outcome>,
    pub task_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub tag: Option<String>,
    pub include_archived: bool,
}

/// A page of results plus the offset to request for the next page,
/// `None` once there is nothing left.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_offset: Option<usize>,
}

/// One full-text match: the node id and a snippet around the hit.
#[derive(Debug, Clone)]
pub struct FtsMatch {
    pub node_id: brain_types::NodeId,
    pub snippet: String,
    pub rank: f64,
}

/// A semantic search hit: node id and clamped similarity (§4.3).
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub node_id: brain_types::NodeId,
    pub similarity: f64,
}

/// The induced subgraph returned by graph traversal (§4.3).
#[derive(Debug, Clone, Default)]
pub struct Subgraph {
    pub nodes: Vec<brain_types::NodeId>,
    pub edges: Vec<brain_types::Edge>,
}
