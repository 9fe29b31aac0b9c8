//! Synthetic transcript fixtures.
//!
//! There is no sample corpus to copy from for this domain (unlike a
//! provider's own exported logs): the wire format is ours, so fixtures
//! are generated record by record instead of copied from disk.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Base timestamp fixtures advance from, one second per appended
/// record. Fixed rather than `Utc::now()` so assertions on ordering
/// and on derived ids stay deterministic across runs.
fn base_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// Builds a synthetic session transcript line by line, in the §6 wire
/// format `brain_core::parse_session_file` consumes.
pub struct TranscriptBuilder {
    lines: Vec<Value>,
    next_ts: DateTime<Utc>,
}

impl TranscriptBuilder {
    /// Start a new transcript with a header naming `computer`.
    pub fn new(computer: impl Into<String>) -> Self {
        let mut builder = Self {
            lines: Vec::new(),
            next_ts: base_timestamp(),
        };
        let ts = builder.tick();
        builder.lines.push(json!({
            "kind": "header",
            "id": "header",
            "ts": ts,
            "computer": computer.into(),
        }));
        builder
    }

    fn tick(&mut self) -> DateTime<Utc> {
        let ts = self.next_ts;
        self.next_ts += Duration::seconds(1);
        ts
    }

    /// Append a `message` entry.
    pub fn message(mut self, id: &str, parent_id: Option<&str>, role: &str, text: &str) -> Self {
        let ts = self.tick();
        self.lines.push(json!({
            "kind": "message",
            "id": id,
            "parent_id": parent_id,
            "ts": ts,
            "role": role,
            "text": text,
        }));
        self
    }

    /// Append a `message` entry carrying token and cost figures, for
    /// tests exercising `Session::aggregate_statistics`.
    pub fn message_with_usage(
        mut self,
        id: &str,
        parent_id: Option<&str>,
        role: &str,
        text: &str,
        model: &str,
        tokens: u64,
        cost_usd: f64,
    ) -> Self {
        let ts = self.tick();
        self.lines.push(json!({
            "kind": "message",
            "id": id,
            "parent_id": parent_id,
            "ts": ts,
            "role": role,
            "text": text,
            "model": model,
            "tokens": tokens,
            "cost_usd": cost_usd,
        }));
        self
    }

    /// Append a `branch_summary` entry, opening a new segment (§4.2).
    pub fn branch_summary(mut self, id: &str, parent_id: Option<&str>, text: &str) -> Self {
        let ts = self.tick();
        self.lines.push(json!({
            "kind": "branch_summary",
            "id": id,
            "parent_id": parent_id,
            "ts": ts,
            "text": text,
        }));
        self
    }

    /// Append a `compaction` entry.
    pub fn compaction(mut self, id: &str, parent_id: Option<&str>) -> Self {
        let ts = self.tick();
        self.lines.push(json!({
            "kind": "compaction",
            "id": id,
            "parent_id": parent_id,
            "ts": ts,
        }));
        self
    }

    /// Append a `session_info` entry. A `parent_session_id` different
    /// from the file's own lineage signals a fork (§4.2).
    pub fn session_info(
        mut self,
        id: &str,
        parent_id: Option<&str>,
        session_id: &str,
        parent_session_id: Option<&str>,
    ) -> Self {
        let ts = self.tick();
        self.lines.push(json!({
            "kind": "session_info",
            "id": id,
            "parent_id": parent_id,
            "ts": ts,
            "session_id": session_id,
            "parent_session_id": parent_session_id,
        }));
        self
    }

    /// Append a `label` entry.
    pub fn label(mut self, id: &str, parent_id: Option<&str>) -> Self {
        let ts = self.tick();
        self.lines.push(json!({
            "kind": "label",
            "id": id,
            "parent_id": parent_id,
            "ts": ts,
        }));
        self
    }

    /// Append a line that fails to deserialize as any known record
    /// kind, to exercise the parser's tolerate-and-skip path.
    pub fn garbage_line(mut self, raw: &str) -> Self {
        self.lines.push(Value::String(raw.to_string()));
        self
    }

    fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| match line {
                Value::String(raw) => raw.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }

    /// Write the transcript to an exact path.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())
    }

    /// Write the transcript to `dir/filename`, returning the path.
    pub fn write_in(&self, dir: &Path, filename: &str) -> std::io::Result<PathBuf> {
        let path = dir.join(filename);
        self.write_to(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_parsable_linear_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = TranscriptBuilder::new("laptop")
            .message("e1", None, "user", "hi")
            .message("e2", Some("e1"), "assistant", "hello")
            .write_in(dir.path(), "session.jsonl")
            .unwrap();

        let session = brain_core::parse_session_file(&path).unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.header_computer.as_deref(), Some("laptop"));
        assert_eq!(session.leaf().unwrap().as_str(), "e2");
    }

    #[test]
    fn garbage_trailing_line_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = TranscriptBuilder::new("laptop")
            .message("e1", None, "user", "hi")
            .garbage_line("{\"kind\":\"message\",\"id\":\"e2\",\"parent_i")
            .write_in(dir.path(), "session.jsonl")
            .unwrap();

        let session = brain_core::parse_session_file(&path).unwrap();
        assert_eq!(session.len(), 1);
    }
}
