use serde::{Deserialize, Serialize};

/// Severity of an aggregated pattern (§3). Ordered so a `max` over a
/// batch of insights picks the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A derived record summarizing repeated observations by model, tool,
/// or pattern string (§3). Keyed by `(kind, model, tool, pattern)` in
/// the store; `kind` distinguishes the three keying families pattern
/// aggregation produces (model-stat, tool-stat, lesson-pattern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedInsight {
    pub kind: String,
    pub model: Option<String>,
    pub tool: Option<String>,
    pub pattern: String,
    pub frequency: u64,
    pub mean_confidence: f64,
    pub severity: Severity,
    pub workaround_hint: Option<String>,
    pub prompt_text: Option<String>,
    pub prompt_included: bool,
    pub prompt_version: Option<String>,
}
