use crate::error::{Error, Result};
use brain_types::{Job, JobPriority, JobStatus, JobType};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Default lease duration for a dequeued job (§4.5).
pub const DEFAULT_LEASE_MINUTES: i64 = 30;

/// Counts of jobs in each status, for `stats`/`counts_by_status` (§4.5).
#[derive(Debug, Clone, Default)]
pub struct QueueCounts {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

/// The durable priority job queue, sharing its connection with the
/// graph store (§4.5: "persisted in the same relational database").
#[derive(Clone)]
pub struct JobQueue {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

fn random_job_id() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn job_type_str(t: JobType) -> &'static str {
    match t {
        JobType::UserTriggered => "user_triggered",
        JobType::Fork => "fork",
        JobType::Initial => "initial",
        JobType::Reanalysis => "reanalysis",
        JobType::Connection => "connection",
    }
}

fn parse_job_type(s: &str) -> JobType {
    match s {
        "user_triggered" => JobType::UserTriggered,
        "fork" => JobType::Fork,
        "reanalysis" => JobType::Reanalysis,
        "connection" => JobType::Connection,
        _ => JobType::Initial,
    }
}

fn status_str(s: JobStatus) -> &'static str {
    match s {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> JobStatus {
    match s {
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Pending,
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Input to `enqueue` (§4.5).
pub struct JobInput {
    pub job_type: JobType,
    pub session_file: std::path::PathBuf,
    pub segment: Option<brain_types::SegmentTriple>,
    pub context: serde_json::Value,
    pub max_retries: u32,
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let job_type: String = row.get(1)?;
    let session_file: String = row.get(3)?;
    let start: Option<String> = row.get(4)?;
    let end: Option<String> = row.get(5)?;
    let context: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    let lease_expires_at: Option<String> = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Job {
        id: row.get(0)?,
        job_type: parse_job_type(&job_type),
        priority: JobPriority(row.get(2)?),
        session_file: session_file.into(),
        segment: match (start, end) {
            (Some(start), Some(end)) => Some(brain_types::SegmentTriple {
                session_file: row.get::<_, String>(3)?.into(),
                start: brain_types::EntryId::new(start),
                end: brain_types::EntryId::new(end),
            }),
            _ => None,
        },
        context: context
            .and_then(|c| serde_json::from_str(&c).ok())
            .unwrap_or(serde_json::Value::Null),
        status: parse_status(&status),
        retry_count: row.get(8)?,
        max_retries: row.get(9)?,
        worker_id: row.get(10)?,
        lease_expires_at: lease_expires_at.map(|s| parse_ts(&s)),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
        last_error: row.get(14)?,
        result_node_id: row.get(15)?,
    })
}

const JOB_COLUMNS: &str = "id, job_type, priority, session_file, start_entry_id, end_entry_id, \
    context, status, retry_count, max_retries, worker_id, lease_expires_at, created_at, \
    updated_at, last_error, result_node_id";

impl JobQueue {
    pub fn enqueue(&self, input: JobInput) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        self.enqueue_one(&conn, input)
    }

    /// Insert all jobs in a single transaction (§4.5, "enqueue-many").
    pub fn enqueue_many(&self, inputs: Vec<JobInput>) -> Result<Vec<Job>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut jobs = Vec::with_capacity(inputs.len());
        for input in inputs {
            jobs.push(self.enqueue_one(&tx, input)?);
        }
        tx.commit()?;
        Ok(jobs)
    }

    fn enqueue_one(&self, conn: &Connection, input: JobInput) -> Result<Job> {
        let id = random_job_id();
        let now = Utc::now();
        let priority = input.job_type.priority();
        let (start, end, session_file) = match &input.segment {
            Some(seg) => (
                Some(seg.start.as_str().to_string()),
                Some(seg.end.as_str().to_string()),
                seg.session_file.to_string_lossy().into_owned(),
            ),
            None => (None, None, input.session_file.to_string_lossy().into_owned()),
        };

        conn.execute(
            r#"
            INSERT INTO analysis_queue (
                id, job_type, priority, session_file, start_entry_id, end_entry_id,
                context, status, retry_count, max_retries, worker_id, lease_expires_at,
                created_at, updated_at, last_error, result_node_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', 0, ?8, NULL, NULL, ?9, ?9, NULL, NULL)
            "#,
            params![
                id,
                job_type_str(input.job_type),
                priority.0,
                session_file,
                start,
                end,
                input.context.to_string(),
                input.max_retries,
                now.to_rfc3339(),
            ],
        )?;

        conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM analysis_queue WHERE id = ?1"),
            params![id],
            row_to_job,
        )
        .map_err(Error::from)
    }

    /// Atomically claim the highest-priority pending job (§4.5). Uses
    /// an immediate transaction so concurrent dequeuers on the same
    /// connection pool serialize on the row lock rather than racing.
    pub fn dequeue(&self, worker_id: &str, lease_minutes: i64) -> Result<Option<Job>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let now = Utc::now();
        let candidate: Option<String> = tx
            .query_row(
                r#"
                SELECT id FROM analysis_queue
                WHERE status = 'pending' AND (lease_expires_at IS NULL OR lease_expires_at <= ?1)
                ORDER BY priority ASC, created_at ASC, id ASC
                LIMIT 1
                "#,
                params![now.to_rfc3339()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(job_id) = candidate else {
            tx.commit()?;
            return Ok(None);
        };

        let lease_expires = now + Duration::minutes(lease_minutes);
        tx.execute(
            r#"
            UPDATE analysis_queue SET status = 'running', worker_id = ?1,
                lease_expires_at = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
            params![worker_id, lease_expires.to_rfc3339(), now.to_rfc3339(), job_id],
        )?;

        let job = tx.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM analysis_queue WHERE id = ?1"),
            params![job_id],
            row_to_job,
        )?;
        tx.commit()?;
        Ok(Some(job))
    }

    pub fn complete(&self, job_id: &str, result_node_id: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE analysis_queue SET status = 'completed', worker_id = NULL,
                lease_expires_at = NULL, result_node_id = ?1, updated_at = ?2
            WHERE id = ?3
            "#,
            params![result_node_id, Utc::now().to_rfc3339(), job_id],
        )?;
        Ok(())
    }

    /// Increment retry count; return to `pending` with a backoff delay
    /// if under `max_retries`, else transition to `failed` (§4.5).
    pub fn fail(&self, job_id: &str, error: &str, backoff_seconds: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let (retry_count, max_retries): (u32, u32) = conn.query_row(
            "SELECT retry_count, max_retries FROM analysis_queue WHERE id = ?1",
            params![job_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let now = Utc::now();
        if retry_count + 1 < max_retries {
            let not_before = now + Duration::seconds(backoff_seconds);
            conn.execute(
                r#"
                UPDATE analysis_queue SET status = 'pending', retry_count = retry_count + 1,
                    worker_id = NULL, lease_expires_at = ?1, last_error = ?2, updated_at = ?3
                WHERE id = ?4
                "#,
                params![not_before.to_rfc3339(), error, now.to_rfc3339(), job_id],
            )?;
        } else {
            conn.execute(
                r#"
                UPDATE analysis_queue SET status = 'failed', retry_count = retry_count + 1,
                    worker_id = NULL, lease_expires_at = NULL, last_error = ?1, updated_at = ?2
                WHERE id = ?3
                "#,
                params![error, now.to_rfc3339(), job_id],
            )?;
        }
        Ok(())
    }

    /// Immediately transition to `failed`, bypassing the retry budget
    /// (§4.4: permanent failure classes "exit the retry loop
    /// immediately" since retrying cannot change the outcome).
    pub fn fail_permanently(&self, job_id: &str, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE analysis_queue SET status = 'failed', retry_count = retry_count + 1,
                worker_id = NULL, lease_expires_at = NULL, last_error = ?1, updated_at = ?2
            WHERE id = ?3
            "#,
            params![error, Utc::now().to_rfc3339(), job_id],
        )?;
        Ok(())
    }

    /// Return every running job whose lease has expired to `pending`
    /// (§4.5). Does not touch retry counters.
    pub fn release_stale(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let n = conn.execute(
            r#"
            UPDATE analysis_queue SET status = 'pending', worker_id = NULL, lease_expires_at = NULL
            WHERE status = 'running' AND lease_expires_at IS NOT NULL AND lease_expires_at <= ?1
            "#,
            params![now],
        )?;
        Ok(n)
    }

    /// Unconditional recovery at startup (§4.7): every running job
    /// becomes pending regardless of lease state.
    pub fn release_all_running(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE analysis_queue SET status = 'pending', worker_id = NULL, lease_expires_at = NULL WHERE status = 'running'",
            [],
        )?;
        Ok(n)
    }

    pub fn has_existing_job(&self, session_file: &Path, start: Option<&str>, end: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let session_file = session_file.to_string_lossy().into_owned();
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM analysis_queue
            WHERE session_file = ?1
                AND start_entry_id IS ?2 AND end_entry_id IS ?3
                AND status IN ('pending', 'running')
            "#,
            params![session_file, start, end],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn counts_by_status(&self) -> Result<QueueCounts> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM analysis_queue GROUP BY status")?;
        let mut counts = QueueCounts::default();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        for row in rows {
            let (status, n) = row?;
            match status.as_str() {
                "pending" => counts.pending = n,
                "running" => counts.running = n,
                "completed" => counts.completed = n,
                "failed" => counts.failed = n,
                _ => {}
            }
        }
        Ok(counts)
    }

    pub fn stats(&self) -> Result<QueueCounts> {
        self.counts_by_status()
    }

    pub fn cancel_job(&self, job_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE analysis_queue SET status = 'failed', last_error = 'cancelled', worker_id = NULL, lease_expires_at = NULL, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), job_id],
        )?;
        Ok(())
    }

    pub fn cancel_jobs_for_session(&self, session_file: &Path) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let session_file = session_file.to_string_lossy().into_owned();
        let n = conn.execute(
            r#"
            UPDATE analysis_queue SET status = 'failed', last_error = 'cancelled', worker_id = NULL,
                lease_expires_at = NULL, updated_at = ?1
            WHERE session_file = ?2 AND status IN ('pending', 'running')
            "#,
            params![Utc::now().to_rfc3339(), session_file],
        )?;
        Ok(n)
    }

    /// `failed -> pending`, counters reset (§4.5).
    pub fn retry_job(&self, job_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE analysis_queue SET status = 'pending', retry_count = 0, last_error = NULL,
                worker_id = NULL, lease_expires_at = NULL, updated_at = ?1
            WHERE id = ?2 AND status = 'failed'
            "#,
            params![Utc::now().to_rfc3339(), job_id],
        )?;
        Ok(())
    }

    pub fn clear_old_completed(&self, older_than_days: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cutoff = Utc::now() - Duration::days(older_than_days);
        let n = conn.execute(
            "DELETE FROM analysis_queue WHERE status = 'completed' AND updated_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(n)
    }

    pub fn clear_all(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM analysis_queue", [])?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn input(job_type: JobType) -> JobInput {
        JobInput {
            job_type,
            session_file: "/s.jsonl".into(),
            segment: None,
            context: serde_json::Value::Null,
            max_retries: 3,
        }
    }

    #[test]
    fn priority_ordering_governs_dequeue() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        queue.enqueue(input(JobType::Reanalysis)).unwrap();
        queue.enqueue(input(JobType::UserTriggered)).unwrap();
        queue.enqueue(input(JobType::Initial)).unwrap();

        let first = queue.dequeue("w1", 30).unwrap().unwrap();
        assert_eq!(first.job_type, JobType::UserTriggered);
        let second = queue.dequeue("w1", 30).unwrap().unwrap();
        assert_eq!(second.job_type, JobType::Initial);
        let third = queue.dequeue("w1", 30).unwrap().unwrap();
        assert_eq!(third.job_type, JobType::Reanalysis);
    }

    #[test]
    fn dequeue_on_empty_queue_returns_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.queue().dequeue("w1", 30).unwrap().is_none());
    }

    #[test]
    fn a_dequeued_job_is_not_dequeued_again_until_lease_expires() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        queue.enqueue(input(JobType::Initial)).unwrap();

        let job = queue.dequeue("w1", 30).unwrap().unwrap();
        assert!(queue.dequeue("w2", 30).unwrap().is_none());
        queue.complete(&job.id, None).unwrap();
    }

    #[test]
    fn fail_under_max_retries_returns_to_pending() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        queue.enqueue(input(JobType::Initial)).unwrap();
        let job = queue.dequeue("w1", 30).unwrap().unwrap();
        queue.fail(&job.id, "boom", 0).unwrap();

        let counts = queue.counts_by_status().unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 0);
    }

    #[test]
    fn fail_past_max_retries_fails_terminally() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        queue.enqueue(JobInput { max_retries: 1, ..input(JobType::Initial) }).unwrap();
        let job = queue.dequeue("w1", 30).unwrap().unwrap();
        queue.fail(&job.id, "boom", 0).unwrap();

        let counts = queue.counts_by_status().unwrap();
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn has_existing_job_deduplicates() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        queue.enqueue(input(JobType::Initial)).unwrap();
        assert!(queue.has_existing_job(Path::new("/s.jsonl"), None, None).unwrap());
        assert!(!queue.has_existing_job(Path::new("/other.jsonl"), None, None).unwrap());
    }

    #[test]
    fn release_all_running_recovers_crashed_leases() {
        let store = Store::open_in_memory().unwrap();
        let queue = store.queue();
        queue.enqueue(input(JobType::Initial)).unwrap();
        queue.dequeue("w1", 30).unwrap();

        let n = queue.release_all_running().unwrap();
        assert_eq!(n, 1);
        assert_eq!(queue.counts_by_status().unwrap().pending, 1);
    }
}
