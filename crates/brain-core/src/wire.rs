use brain_types::{EntryFields, EntryId, EntryKind, TranscriptEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-disk shape of one transcript line (§6, "Transcript file format").
/// Tagged on `kind` so unrecognized future kinds deserialize into
/// `Unknown` rather than failing the whole file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind")]
#[serde(rename_all = "snake_case")]
pub(crate) enum WireRecord {
    Header(HeaderRecord),
    Message(MessageRecord),
    BranchSummary(MessageRecord),
    Compaction(EntryRecord),
    SessionInfo(SessionInfoRecord),
    Label(EntryRecord),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct HeaderRecord {
    pub id: String,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub computer: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct EntryRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct MessageRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tokens: Option<u64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    #[serde(flatten)]
    pub extra: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct SessionInfoRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub parent_session_id: Option<String>,
    #[serde(flatten)]
    pub extra: Value,
}

impl WireRecord {
    /// Convert a non-header record into a [`TranscriptEntry`]. Returns
    /// `None` for `Unknown` records, which the parser drops with a
    /// warning rather than treating as fatal.
    pub(crate) fn into_entry(self) -> Option<TranscriptEntry> {
        let (id, parent_id, timestamp, kind, fields) = match self {
            WireRecord::Header(_) => return None,
            WireRecord::Message(m) => (
                m.id,
                m.parent_id,
                m.ts,
                EntryKind::Message,
                EntryFields {
                    text: m.text,
                    role: m.role,
                    model: m.model,
                    tokens: m.tokens,
                    cost_usd: m.cost_usd,
                    ..Default::default()
                },
            ),
            WireRecord::BranchSummary(m) => (
                m.id,
                m.parent_id,
                m.ts,
                EntryKind::BranchSummary,
                EntryFields {
                    text: m.text,
                    role: m.role,
                    model: m.model,
                    tokens: m.tokens,
                    cost_usd: m.cost_usd,
                    ..Default::default()
                },
            ),
            WireRecord::Compaction(e) => {
                (e.id, e.parent_id, e.ts, EntryKind::Compaction, EntryFields::default())
            }
            WireRecord::SessionInfo(s) => (
                s.id,
                s.parent_id,
                s.ts,
                EntryKind::SessionInfo,
                EntryFields {
                    session_id: s.session_id,
                    parent_session_id: s.parent_session_id,
                    ..Default::default()
                },
            ),
            WireRecord::Label(e) => {
                (e.id, e.parent_id, e.ts, EntryKind::Label, EntryFields::default())
            }
            WireRecord::Unknown => return None,
        };

        Some(TranscriptEntry {
            id: EntryId::new(id),
            parent_id: parent_id.map(EntryId::new),
            timestamp,
            kind,
            fields,
            passthrough: Value::Null,
        })
    }
}
