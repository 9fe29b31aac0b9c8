use crate::events::WorkerEvent;
use brain_analyzer::{AnalyzerAdapter, AnalyzerRequest, EmbeddingClient};
use brain_core::{detect_boundaries, parse_session_file, segments_from_boundaries, DetectorConfig};
use brain_store::Store;
use brain_types::{derive_node_id, Job, Node, Relevance};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Builds the analyzer request for a job, supplying the provider,
/// model, prompt path and credentials the worker pool itself has no
/// opinion about (§4.4's input contract is daemon config, not worker
/// logic).
pub trait RequestBuilder: Send + Sync {
    fn build(&self, job: &Job, computer: &str) -> AnalyzerRequest;
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    /// How long an idle worker sleeps before re-checking the queue.
    /// Bounded so the pool's stop is not blocked for long (§5).
    pub poll_interval: Duration,
    pub lease_minutes: i64,
    pub job_backoff_base: Duration,
    pub job_backoff_max: Duration,
    pub local_hostname: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            poll_interval: Duration::from_millis(500),
            lease_minutes: brain_store::DEFAULT_LEASE_MINUTES,
            job_backoff_base: Duration::from_secs(5),
            job_backoff_max: Duration::from_secs(300),
            local_hostname: "localhost".to_string(),
        }
    }
}

/// N concurrently executing workers draining the analysis queue (§4.7).
pub struct WorkerPool {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts the pool. Calls `release-all-running` once first so a
    /// prior crash mid-analysis does not strand jobs forever (§4.7,
    /// "Startup recovery").
    pub fn start(
        config: WorkerPoolConfig,
        store: Store,
        analyzer: Arc<AnalyzerAdapter>,
        embeddings: Arc<EmbeddingClient>,
        requests: Arc<dyn RequestBuilder>,
        events: Sender<WorkerEvent>,
    ) -> crate::error::Result<Self> {
        store.queue().release_all_running()?;

        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(config.worker_count);

        for idx in 0..config.worker_count {
            let worker_id = format!("worker-{idx}");
            let stop = Arc::clone(&stop);
            let store = store.clone();
            let analyzer = Arc::clone(&analyzer);
            let embeddings = Arc::clone(&embeddings);
            let requests = Arc::clone(&requests);
            let events = events.clone();
            let config = config.clone();

            let handle = std::thread::Builder::new()
                .name(worker_id.clone())
                .spawn(move || {
                    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        run_loop(
                            &worker_id,
                            &stop,
                            &store,
                            &analyzer,
                            &embeddings,
                            requests.as_ref(),
                            &events,
                            &config,
                        );
                    }));
                    if outcome.is_err() {
                        log::error!("worker {worker_id} panicked");
                    }
                })
                .expect("spawn worker thread");
            handles.push(handle);
        }

        Ok(Self { stop, handles })
    }

    /// Signals every worker to finish its current job and exit, then
    /// joins them. Bounded by the analyzer timeout plus a small grace
    /// period, since that is the longest a worker can be mid-job
    /// (§4.7, "Cancellation").
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_loop(
    worker_id: &str,
    stop: &Arc<AtomicBool>,
    store: &Store,
    analyzer: &AnalyzerAdapter,
    embeddings: &EmbeddingClient,
    requests: &dyn RequestBuilder,
    events: &Sender<WorkerEvent>,
    config: &WorkerPoolConfig,
) {
    let queue = store.queue();
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }

        match queue.dequeue(worker_id, config.lease_minutes) {
            Ok(Some(job)) => {
                process_job(worker_id, store, analyzer, embeddings, requests, events, config, job)
            }
            Ok(None) => std::thread::sleep(config.poll_interval),
            Err(err) => {
                log::error!("worker {worker_id} could not dequeue: {err}");
                std::thread::sleep(config.poll_interval);
            }
        }
    }
}

/// Compose the text an embedding is computed from. Kept stable and
/// simple on purpose: `Embedding.schema_version` is the seam for
/// future changes to this composition, not this function's internals.
fn compose_input_text(node: &Node) -> String {
    let mut parts = vec![node.content.summary.clone()];
    if let Some(project) = &node.classification.project {
        parts.push(format!("project: {project}"));
    }
    if let Some(task_type) = &node.classification.task_type {
        parts.push(format!("task: {task_type}"));
    }
    if !node.classification.languages.is_empty() {
        parts.push(format!("languages: {}", node.classification.languages.join(", ")));
    }
    parts.join("\n")
}

fn process_job(
    worker_id: &str,
    store: &Store,
    analyzer: &AnalyzerAdapter,
    embeddings: &EmbeddingClient,
    requests: &dyn RequestBuilder,
    events: &Sender<WorkerEvent>,
    config: &WorkerPoolConfig,
    job: Job,
) {
    let queue = store.queue();
    let _ = events.send(WorkerEvent::JobStarted {
        job_id: job.id.clone(),
        worker_id: worker_id.to_string(),
    });

    let Some(segment_triple) = job.segment.clone() else {
        let _ = queue.fail_permanently(&job.id, "job has no segment");
        emit_failed(events, &job, worker_id, "job has no segment", false);
        return;
    };

    let session = match parse_session_file(&segment_triple.session_file) {
        Ok(session) => session,
        Err(err) => {
            let message = format!("parse failed: {err}");
            let _ = queue.fail_permanently(&job.id, &message);
            emit_failed(events, &job, worker_id, &message, false);
            return;
        }
    };

    let boundaries = detect_boundaries(&session, &DetectorConfig::default());
    let segments = segments_from_boundaries(&session, &boundaries);
    if !segments
        .iter()
        .any(|s| s.start() == &segment_triple.start && s.end() == &segment_triple.end)
    {
        let message = "target segment no longer present in the session's boundary partition".to_string();
        let _ = queue.fail_permanently(&job.id, &message);
        emit_failed(events, &job, worker_id, &message, false);
        return;
    }

    let computer = session.header_computer.clone().unwrap_or_else(|| config.local_hostname.clone());
    let request = requests.build(&job, &computer);

    match analyzer.analyze(&request, &job.id) {
        Ok(mut node) => {
            node.id = derive_node_id(&segment_triple.session_file, &segment_triple.start, &segment_triple.end);
            node.source = segment_triple.clone();
            node.computer = computer;

            let now = chrono::Utc::now();
            node.version = match store.get_node(&node.id) {
                Ok(previous) => {
                    node.relevance = previous.relevance;
                    previous.version + 1
                }
                Err(brain_store::Error::NotFound(_)) => {
                    node.relevance = Relevance::fresh(now);
                    1
                }
                Err(err) => {
                    let message = format!("could not look up prior node version: {err}");
                    let _ = queue.fail(&job.id, &message, config.job_backoff_base.as_secs() as i64);
                    emit_failed(events, &job, worker_id, &message, true);
                    return;
                }
            };

            let input_text = compose_input_text(&node);
            let embedding = match embeddings.embed(&node.id, &input_text) {
                Ok(embedding) => embedding,
                Err(err) => {
                    let message = format!("embedding failed: {err}");
                    let _ = queue.fail(&job.id, &message, config.job_backoff_base.as_secs() as i64);
                    emit_failed(events, &job, worker_id, &message, true);
                    return;
                }
            };

            match store.upsert_segment(&node, &[], embedding.as_ref()) {
                Ok(()) => {
                    let _ = queue.complete(&job.id, Some(node.id.as_str()));
                    let _ = events.send(WorkerEvent::JobCompleted {
                        job_id: job.id.clone(),
                        worker_id: worker_id.to_string(),
                        node_id: node.id.as_str().to_string(),
                    });
                }
                Err(err) => {
                    let message = format!("upsert failed: {err}");
                    let _ = queue.fail(&job.id, &message, config.job_backoff_base.as_secs() as i64);
                    emit_failed(events, &job, worker_id, &message, true);
                }
            }
        }
        Err(brain_analyzer::Error::Classified(class, message)) if class.is_retryable() => {
            let backoff = brain_analyzer::backoff(job.retry_count, config.job_backoff_base, config.job_backoff_max);
            let _ = queue.fail(&job.id, &message, backoff.as_secs() as i64);
            emit_failed(events, &job, worker_id, &message, true);
        }
        Err(brain_analyzer::Error::Classified(_, message)) => {
            let _ = queue.fail_permanently(&job.id, &message);
            emit_failed(events, &job, worker_id, &message, false);
        }
        Err(err) => {
            let message = err.to_string();
            let _ = queue.fail_permanently(&job.id, &message);
            emit_failed(events, &job, worker_id, &message, false);
        }
    }
}

fn emit_failed(events: &Sender<WorkerEvent>, job: &Job, worker_id: &str, error: &str, retryable: bool) {
    let _ = events.send(WorkerEvent::JobFailed {
        job_id: job.id.clone(),
        worker_id: worker_id.to_string(),
        error: error.to_string(),
        retryable,
    });
}
