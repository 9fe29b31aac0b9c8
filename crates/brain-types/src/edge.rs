use crate::ids::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of edge relation types the consolidation scheduler
/// creates (§4.8), plus `UserDrawn` for edges the out-of-scope
/// dashboard may add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    RelatesTo,
    References,
    Reinforces,
    UserDrawn,
}

/// Who created an edge (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCreator {
    Analyzer,
    Daemon,
    User,
}

/// A directed typed relation between two nodes. Unique within
/// `(source, target, edge_type)` (§3); duplicates are coalesced by the
/// store, never inserted twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub creator: EdgeCreator,
    pub confidence: f64,
    pub similarity: Option<f64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
