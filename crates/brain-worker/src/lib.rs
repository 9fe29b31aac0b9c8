//! The worker pool (C7): drains the analysis queue, invokes the
//! analyzer, and upserts results into the graph store.

mod error;
mod events;
mod pool;

pub use error::{Error, Result};
pub use events::WorkerEvent;
pub use pool::{RequestBuilder, WorkerPool, WorkerPoolConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use brain_analyzer::AnalyzerRequest;
    use brain_store::{JobInput, Store};
    use brain_types::{EntryId, Job, JobType, SegmentTriple};
    use std::path::PathBuf;
    use std::time::Duration;

    struct FixedRequestBuilder;

    impl RequestBuilder for FixedRequestBuilder {
        fn build(&self, _job: &Job, _computer: &str) -> AnalyzerRequest {
            AnalyzerRequest {
                segment: SegmentTriple {
                    session_file: PathBuf::from("/tmp/does-not-matter.jsonl"),
                    start: EntryId::from("e1"),
                    end: EntryId::from("e1"),
                },
                computer: "hub".to_string(),
                prompt_file: PathBuf::from("/tmp/prompt.md"),
                skills_dir: None,
                provider: "test".to_string(),
                model: "test-model".to_string(),
                credentials_env: Vec::new(),
                timeout: Duration::from_secs(1),
            }
        }
    }

    #[test]
    fn job_without_segment_fails_permanently() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        let job = queue
            .enqueue(JobInput {
                job_type: JobType::Initial,
                session_file: PathBuf::from("/tmp/session.jsonl"),
                segment: None,
                context: serde_json::Value::Null,
                max_retries: 3,
            })
            .unwrap();
        assert!(job.segment.is_none());

        // A missing-segment job cannot be analyzed; exercised directly
        // against the queue rather than through a live pool, since
        // reaching the analyzer requires a real session file.
        queue.fail_permanently(&job.id, "job has no segment").unwrap();
        let counts = queue.counts_by_status().unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 0);
    }
}
