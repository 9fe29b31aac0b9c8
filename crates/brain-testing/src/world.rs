//! Declarative integration-test setup: one temp root holding a store,
//! a sessions directory and a mock analyzer, wired together the way a
//! real daemon would wire them in `brain_daemon::Daemon::start`.

use crate::fixtures::TranscriptBuilder;
use crate::mock_analyzer::{MockAnalyzer, MockBehavior};
use brain_analyzer::{AnalyzerAdapter, EmbeddingClient, EmbeddingConfig, EmbeddingProviderKind};
use brain_store::Store;
use brain_worker::{RequestBuilder, WorkerPool, WorkerPoolConfig};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// An isolated store, sessions directory and mock analyzer sharing one
/// temp root, for tests that need to drive the worker pool or watcher
/// end to end without a real analyzer or a persistent daemon.
pub struct TestWorld {
    _temp_dir: TempDir,
    root: PathBuf,
    store: Store,
    sessions_dir: PathBuf,
    analyzer_dir: PathBuf,
    mock: MockAnalyzer,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let root = temp_dir.path().to_path_buf();

        let sessions_dir = root.join("sessions");
        std::fs::create_dir_all(&sessions_dir).expect("sessions dir");

        let store = Store::open(&root.join("brain.sqlite3"), &root.join("blobs")).expect("open store");

        let analyzer_dir = root.join("analyzer");
        let mock = MockAnalyzer::install(&analyzer_dir).expect("install mock analyzer");

        Self { _temp_dir: temp_dir, root, store, sessions_dir, analyzer_dir, mock }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn mock_analyzer(&self) -> &MockAnalyzer {
        &self.mock
    }

    /// Write a synthetic transcript into this world's sessions
    /// directory and return its path.
    pub fn write_transcript(&self, filename: &str, builder: TranscriptBuilder) -> PathBuf {
        builder.write_in(&self.sessions_dir, filename).expect("write transcript")
    }

    /// Change what the mock analyzer does on its next invocation.
    pub fn set_analyzer_behavior(&self, behavior: MockBehavior) {
        self.mock.set_behavior(&behavior, &self.analyzer_dir).expect("set behavior");
    }

    /// Start a one-worker pool against this world's store and mock
    /// analyzer, let it run briefly, then stop it. The mock analyzer
    /// answers immediately, so a short sleep is enough to drain
    /// whatever is queued; tests assert on `store().queue()` state
    /// afterward rather than on completion events.
    pub fn drain_queue_once(&self, requests: Arc<dyn RequestBuilder>) {
        let (events, _rx): (_, Receiver<_>) = std::sync::mpsc::channel();
        let analyzer = Arc::new(AnalyzerAdapter::new(
            self.mock.binary_path(),
            self.root.join("analyzer-logs"),
            0,
            Duration::from_millis(10),
            Duration::from_millis(10),
        ));

        let embeddings = Arc::new(EmbeddingClient::new(EmbeddingConfig {
            provider: EmbeddingProviderKind::Mock,
            model: "mock".to_string(),
            api_key: None,
            base_url: None,
        }));

        let pool = WorkerPool::start(
            WorkerPoolConfig::default(),
            self.store.clone(),
            analyzer,
            embeddings,
            requests,
            events,
        )
        .expect("start worker pool");

        std::thread::sleep(Duration::from_millis(300));
        pool.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_analyzer::AnalyzerRequest;
    use brain_store::JobInput;
    use brain_types::{EntryId, Job, JobType, SegmentTriple};
    use std::path::PathBuf;

    struct FixedRequestBuilder;

    impl RequestBuilder for FixedRequestBuilder {
        fn build(&self, job: &Job, computer: &str) -> AnalyzerRequest {
            AnalyzerRequest {
                segment: job.segment.clone().expect("segment"),
                computer: computer.to_string(),
                prompt_file: PathBuf::from("prompt.md"),
                skills_dir: None,
                provider: "mock".to_string(),
                model: "mock".to_string(),
                credentials_env: vec![],
                timeout: Duration::from_secs(5),
            }
        }
    }

    #[test]
    fn drains_one_job_through_a_succeeding_mock_analyzer() {
        let world = TestWorld::new();
        let session_file = world.write_transcript(
            "session.jsonl",
            crate::fixtures::TranscriptBuilder::new("laptop")
                .message("e1", None, "user", "hi")
                .message("e2", Some("e1"), "assistant", "hello"),
        );

        world
            .store()
            .queue()
            .enqueue(JobInput {
                job_type: JobType::Initial,
                session_file: session_file.clone(),
                segment: Some(SegmentTriple {
                    session_file,
                    start: EntryId::from("e1"),
                    end: EntryId::from("e2"),
                }),
                context: serde_json::Value::Null,
                max_retries: 3,
            })
            .unwrap();

        world.drain_queue_once(Arc::new(FixedRequestBuilder));

        let counts = world.store().queue().counts_by_status().unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.failed, 0);
    }
}
