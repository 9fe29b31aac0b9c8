//! A mock analyzer subprocess for exercising `AnalyzerAdapter` and the
//! worker pool without invoking a real LLM.
//!
//! Compiling an additional Rust binary crate is not an option here
//! (nothing in this workspace is built), so the stand-in is a small
//! shell script written to disk and marked executable, matching the
//! CLI contract `brain_analyzer::AnalyzerAdapter::invoke_once` drives:
//! flags ignored, a JSON `Node` document on stdout.

use brain_types::{
    Classification, Content, DaemonMeta, LessonBuckets, Node, NodeMetadata, Observations, Outcome,
    Relevance, Semantic, SegmentTriple,
};
use chrono::{TimeZone, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// The behavior a mock analyzer invocation should exhibit, chosen per
/// test rather than per script so one fixture can simulate a flaky
/// run across retries.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Exit 0 and print a well-formed `Node` on stdout.
    Succeed,
    /// Exit 0 but print text that does not parse as a `Node`.
    PrintGarbage,
    /// Exit nonzero, printing `message` on stderr.
    Fail { code: i32, message: String },
    /// Sleep past any caller-supplied timeout without exiting.
    HangForever,
}

/// An analyzer binary stand-in backed by a generated shell script.
///
/// The script reads its desired behavior from a sibling file whose
/// path is baked into the script at generation time, so the same
/// binary path can be handed to
/// [`AnalyzerAdapter`](brain_analyzer::AnalyzerAdapter) across a whole
/// test while the behavior underneath it changes between invocations.
pub struct MockAnalyzer {
    script_path: PathBuf,
    behavior_path: PathBuf,
}

impl MockAnalyzer {
    /// Write the script into `dir` and default it to [`MockBehavior::Succeed`].
    pub fn install(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let script_path = dir.join("mock-analyze.sh");
        let behavior_path = dir.join("behavior.json");

        let script = format!(
            "#!/bin/sh\n\
             behavior_file=\"{behavior}\"\n\
             kind=$(sed -n 's/.*\"kind\":\"\\([a-z_]*\\)\".*/\\1/p' \"$behavior_file\")\n\
             case \"$kind\" in\n\
             \"fail\")\n\
             \tcode=$(sed -n 's/.*\"code\":\\([0-9-]*\\).*/\\1/p' \"$behavior_file\")\n\
             \tsed -n 's/.*\"message\":\"\\(.*\\)\",\"code\".*/\\1/p' \"$behavior_file\" >&2\n\
             \texit \"$code\"\n\
             \t;;\n\
             \"garbage\")\n\
             \techo 'not json'\n\
             \texit 0\n\
             \t;;\n\
             \"hang\")\n\
             \twhile true; do sleep 1; done\n\
             \t;;\n\
             *)\n\
             \tcat \"{body}\"\n\
             \texit 0\n\
             \t;;\n\
             esac\n",
            behavior = behavior_path.display(),
            body = dir.join("node.json").display(),
        );

        std::fs::write(&script_path, script)?;
        #[cfg(unix)]
        std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755))?;

        let mock = Self { script_path, behavior_path };
        mock.set_behavior(&MockBehavior::Succeed, dir)?;
        Ok(mock)
    }

    /// Path to hand to `AnalyzerAdapter::new` as the analyzer binary.
    pub fn binary_path(&self) -> PathBuf {
        self.script_path.clone()
    }

    /// Change what the next invocation does.
    pub fn set_behavior(&self, behavior: &MockBehavior, dir: &Path) -> std::io::Result<()> {
        let descriptor = match behavior {
            MockBehavior::Succeed => {
                let node = sample_node();
                let mut file = std::fs::File::create(dir.join("node.json"))?;
                write!(file, "{}", serde_json::to_string(&node).unwrap())?;
                "{\"kind\":\"succeed\"}".to_string()
            }
            MockBehavior::PrintGarbage => "{\"kind\":\"garbage\"}".to_string(),
            MockBehavior::Fail { code, message } => {
                format!("{{\"kind\":\"fail\",\"message\":\"{message}\",\"code\":{code}}}")
            }
            MockBehavior::HangForever => "{\"kind\":\"hang\"}".to_string(),
        };
        std::fs::write(&self.behavior_path, descriptor)
    }
}

/// A `Node` with every field populated with inert placeholder values.
/// The worker pool overwrites `id`, `source`, `computer`, `version`
/// and `relevance` before persisting, so only the shape needs to be
/// valid, not the content.
fn sample_node() -> Node {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    Node {
        id: "placeholder".to_string().into(),
        version: 1,
        source: SegmentTriple {
            session_file: PathBuf::from("placeholder.jsonl"),
            start: "e1".into(),
            end: "e1".into(),
        },
        computer: "placeholder".to_string(),
        classification: Classification {
            task_type: Some("feature".to_string()),
            project: Some("mock-project".to_string()),
            languages: vec!["rust".to_string()],
            frameworks: vec![],
            flags: vec![],
        },
        content: Content {
            summary: "mock analysis summary".to_string(),
            outcome: Some(Outcome::Success),
            key_decisions: vec![],
            touched_files: vec![],
            tools_used: vec![],
            errors_observed: vec![],
        },
        lessons: LessonBuckets::default(),
        observations: Observations::default(),
        metadata: NodeMetadata {
            tokens: 100,
            cost_usd: 0.01,
            wall_duration_secs: 1.0,
            observed_at: now,
            analyzed_at: now,
            analyzer_version: "mock-1".to_string(),
        },
        semantic: Semantic::default(),
        daemon: DaemonMeta::default(),
        signals: None,
        relevance: Relevance::fresh(now),
        extra: serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn succeeding_script_prints_a_parsable_node() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockAnalyzer::install(dir.path()).unwrap();

        let output = Command::new(mock.binary_path()).output().unwrap();
        assert!(output.status.success());
        let node: Node = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(node.content.summary, "mock analysis summary");
    }

    #[test]
    fn failing_behavior_exits_nonzero_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockAnalyzer::install(dir.path()).unwrap();
        mock.set_behavior(
            &MockBehavior::Fail { code: 3, message: "rate limited".to_string() },
            dir.path(),
        )
        .unwrap();

        let output = Command::new(mock.binary_path()).output().unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert!(String::from_utf8_lossy(&output.stderr).contains("rate limited"));
    }

    #[test]
    fn garbage_behavior_exits_zero_with_unparsable_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockAnalyzer::install(dir.path()).unwrap();
        mock.set_behavior(&MockBehavior::PrintGarbage, dir.path()).unwrap();

        let output = Command::new(mock.binary_path()).output().unwrap();
        assert!(output.status.success());
        assert!(serde_json::from_slice::<Node>(&output.stdout).is_err());
    }
}
