/// Lifecycle notifications a worker emits for each job it handles
/// (§4.7). Consumers subscribe via the channel `WorkerPool::start`
/// returns a sender counterpart of; nothing in this crate interprets
/// these beyond forwarding them.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    JobStarted { job_id: String, worker_id: String },
    JobCompleted { job_id: String, worker_id: String, node_id: String },
    JobFailed { job_id: String, worker_id: String, error: String, retryable: bool },
}
