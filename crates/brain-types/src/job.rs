use crate::entry::EntryId;
use crate::segment::SegmentTriple;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The kind of work a queued job represents (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    UserTriggered,
    Fork,
    Initial,
    Reanalysis,
    Connection,
}

impl JobType {
    /// The fixed priority integer for this job type (§4.5): lower
    /// sorts earlier. `user_triggered < fork < initial < reanalysis <
    /// connection`.
    pub fn priority(self) -> JobPriority {
        JobPriority(match self {
            JobType::UserTriggered => 0,
            JobType::Fork => 1,
            JobType::Initial => 2,
            JobType::Reanalysis => 3,
            JobType::Connection => 4,
        })
    }
}

/// A fixed priority integer. Lower sorts earlier; ties break by
/// enqueue time then job id (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPriority(pub i32);

/// The job lifecycle states (§4.5): `pending -> running -> {completed,
/// failed, pending}`. A stale lease is a silent `running -> pending`
/// transition, not a distinct state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A queued unit of analysis work (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub priority: JobPriority,
    pub session_file: PathBuf,
    pub segment: Option<SegmentTriple>,
    #[serde(default)]
    pub context: serde_json::Value,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub result_node_id: Option<String>,
}

impl Job {
    pub fn start_id(&self) -> Option<&EntryId> {
        self.segment.as_ref().map(|s| &s.start)
    }

    pub fn end_id(&self) -> Option<&EntryId> {
        self.segment.as_ref().map(|s| &s.end)
    }
}
