//! Filesystem watcher and idle-session trigger (C6).
//!
//! Watches the hub directory and each enabled spoke, tracks per-file
//! state, and enqueues an `initial` analysis job once a session has
//! gone idle and its leaf has moved past the last analyzed boundary.

mod error;
mod recognition;
mod state;
mod trigger;
mod watcher;

pub use error::{Error, Result};
pub use recognition::{computer_for_path, JsonlSessionRecognizer, PathRecognizer, SpokeDir};
pub use state::{fingerprint_leaf_chain, FileState, StateTable};
pub use trigger::{current_leaf, trigger_initial_job};
pub use watcher::{SessionWatcher, WatchRoot, WatcherConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use brain_store::Store;
    use chrono::Utc;
    use std::io::Write;

    fn write_session(path: &std::path::Path, lines: &[&str]) {
        let mut file = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    #[test]
    fn idle_session_triggers_exactly_one_job() {
        let dir = tempfile::tempdir().unwrap();
        let session_path = dir.path().join("session.jsonl");
        write_session(
            &session_path,
            &[
                r#"{"kind":"header","id":"h1","ts":"2026-01-01T00:00:00Z","computer":"hub","session_id":"s1"}"#,
                r#"{"kind":"message","id":"e1","parent_id":null,"ts":"2026-01-01T00:00:00Z","role":"user","text":"hi"}"#,
                r#"{"kind":"message","id":"e2","parent_id":"e1","ts":"2026-01-01T00:01:00Z","role":"assistant","text":"hello"}"#,
            ],
        );

        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        let mut state = FileState::observed(Utc::now(), 0);

        let segment = trigger_initial_job(&session_path, &mut state, &queue, &brain_core::DetectorConfig::default())
            .unwrap();
        assert!(segment.is_some());
        assert!(queue.has_existing_job(&session_path, Some("e1"), Some("e2")).unwrap());

        let again = trigger_initial_job(&session_path, &mut state, &queue, &brain_core::DetectorConfig::default())
            .unwrap();
        assert!(again.is_none());
    }
}
