use crate::ids::NodeId;
use crate::segment::SegmentTriple;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The analyzer-reported outcome of a segment (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failed,
    Abandoned,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failed => "failed",
            Outcome::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Outcome::Success),
            "partial" => Ok(Outcome::Partial),
            "failed" => Ok(Outcome::Failed),
            "abandoned" => Ok(Outcome::Abandoned),
            other => Err(crate::error::Error::InvalidValue(format!(
                "unknown outcome: {other}"
            ))),
        }
    }
}

/// Task-type tag, project and language/framework classification (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Classification {
    pub task_type: Option<String>,
    pub project: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Summary content of the analyzed segment (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    pub summary: String,
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub touched_files: Vec<String>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub errors_observed: Vec<String>,
}

/// Seven disjoint lesson buckets (§3). Each bucket is a free-form list
/// of lesson strings; the scheduler's pattern-aggregation job mines
/// these for repeated observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonBuckets {
    #[serde(default)]
    pub project: Vec<String>,
    #[serde(default)]
    pub task: Vec<String>,
    #[serde(default)]
    pub user: Vec<String>,
    #[serde(default)]
    pub model: Vec<String>,
    #[serde(default)]
    pub tool: Vec<String>,
    #[serde(default)]
    pub skill: Vec<String>,
    #[serde(default)]
    pub subagent: Vec<String>,
}

impl LessonBuckets {
    /// Iterate over `(bucket_name, lesson)` pairs, for pattern
    /// aggregation keyed by lesson text.
    pub fn iter_named(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let buckets: [(&'static str, &[String]); 7] = [
            ("project", &self.project),
            ("task", &self.task),
            ("user", &self.user),
            ("model", &self.model),
            ("tool", &self.tool),
            ("skill", &self.skill),
            ("subagent", &self.subagent),
        ];
        buckets
            .into_iter()
            .flat_map(|(name, lessons)| lessons.iter().map(move |l| (name, l.as_str())))
    }
}

/// Models used, prompting observations and tool-use errors (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observations {
    #[serde(default)]
    pub models_used: Vec<String>,
    #[serde(default)]
    pub prompting_wins: Vec<String>,
    #[serde(default)]
    pub prompting_failures: Vec<String>,
    #[serde(default)]
    pub model_quirks: Vec<String>,
    #[serde(default)]
    pub tool_use_errors: Vec<String>,
}

/// Analysis metadata: cost, duration, analyzer provenance (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub tokens: u64,
    pub cost_usd: f64,
    pub wall_duration_secs: f64,
    pub observed_at: DateTime<Utc>,
    pub analyzed_at: DateTime<Utc>,
    pub analyzer_version: String,
}

/// Tags, topics, related-project refs and concepts (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Semantic {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub related_projects: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// Daemon-recorded metadata about the analysis itself, distinct from
/// what the analyzer reports (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonMeta {
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub rlm_skill_used: bool,
    pub segment_token_count: u64,
}

/// Optional friction/delight signals (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signals {
    pub friction_score: Option<f64>,
    pub delight_score: Option<f64>,
    #[serde(default)]
    pub derived_flags: Vec<String>,
}

/// Relevance tracking for decay/archival (§3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relevance {
    pub score: f64,
    pub archived: bool,
    pub last_accessed_at: DateTime<Utc>,
}

impl Relevance {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            score: 1.0,
            archived: false,
            last_accessed_at: now,
        }
    }
}

/// The analyzer's structured output for one segment, enriched with
/// daemon bookkeeping (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub version: u32,
    pub source: SegmentTriple,
    pub computer: String,
    pub classification: Classification,
    pub content: Content,
    pub lessons: LessonBuckets,
    pub observations: Observations,
    pub metadata: Metadata,
    pub semantic: Semantic,
    pub daemon: DaemonMeta,
    pub signals: Option<Signals>,
    pub relevance: Relevance,
    /// Optional fields the analyzer schema has accreted that this
    /// daemon does not model explicitly (§9). Preserved verbatim on
    /// the blob, ignored by the relational projection.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl Node {
    /// True once `version` has been incremented at least once, i.e.
    /// this node has been reanalyzed.
    pub fn is_reanalyzed(&self) -> bool {
        self.version > 1
    }
}
