use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a transcript entry, unique within one session file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The closed set of record kinds a transcript entry may declare.
///
/// `Header` must be the first record in a file (§4.1). Everything else
/// is a node in the provenance tree, keyed off `parent_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Header,
    Message,
    BranchSummary,
    Compaction,
    SessionInfo,
    Label,
}

/// A single immutable record in an append-only transcript file.
///
/// Entries form a directed acyclic tree rooted at entries whose
/// `parent_id` is `None`. The header entry is exempt from tree
/// membership: it precedes the tree and carries session metadata only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub parent_id: Option<EntryId>,
    pub timestamp: DateTime<Utc>,
    pub kind: EntryKind,
    /// Kind-specific fields the detector and parser care about.
    #[serde(default)]
    pub fields: EntryFields,
    /// Any fields present on the wire record that this daemon does not
    /// model explicitly. Preserved on round-trip, never inspected.
    #[serde(default)]
    pub passthrough: serde_json::Value,
}

/// Typed fields extracted from an entry's payload, independent of the
/// raw wire shape. Absent fields default to `None`/empty so the parser
/// can populate only what a given `EntryKind` actually carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryFields {
    /// Message text, for `EntryKind::Message` and `BranchSummary`.
    pub text: Option<String>,
    /// Role of the message author (`user`, `assistant`, `tool`, ...).
    pub role: Option<String>,
    /// Model identifier used to produce this entry, if any.
    pub model: Option<String>,
    /// Token count attributable to this entry, if reported.
    pub tokens: Option<u64>,
    /// Cost in USD attributable to this entry, if reported.
    pub cost_usd: Option<f64>,
    /// For `EntryKind::SessionInfo`: the session id this file claims to
    /// belong to, used by the fork detector (§4.2) to notice the file
    /// has switched lineage mid-stream.
    pub session_id: Option<String>,
    /// For `EntryKind::SessionInfo`: the parent session id, if this
    /// session was forked from another one.
    pub parent_session_id: Option<String>,
    /// For `EntryKind::Header`: the computer label that produced this
    /// transcript.
    pub computer: Option<String>,
}
