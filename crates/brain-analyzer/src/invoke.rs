use crate::backoff::backoff;
use crate::classify::{classify, FailureClass, ProcessOutcome};
use crate::error::{Error, Result};
use crate::log::write_attempt_log;
use brain_types::{Node, SegmentTriple};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Everything the analyzer subprocess needs to know about one segment
/// (§4.4).
pub struct AnalyzerRequest {
    pub segment: SegmentTriple,
    pub computer: String,
    pub prompt_file: PathBuf,
    pub skills_dir: Option<PathBuf>,
    pub provider: String,
    pub model: String,
    /// Environment variables carrying credentials, passed through to
    /// the child process verbatim.
    pub credentials_env: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Wraps the opaque analyzer subprocess with retry and logging
/// (§4.4). Never touches the graph store.
pub struct AnalyzerAdapter {
    binary: PathBuf,
    logs_dir: PathBuf,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl AnalyzerAdapter {
    pub fn new(binary: PathBuf, logs_dir: PathBuf, max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { binary, logs_dir, max_retries, base_delay, max_delay }
    }

    /// Run the analyzer for one job, retrying retryable failures with
    /// full-jitter exponential backoff. Permanent failures and
    /// exhausted retries return the classified error to the caller,
    /// which routes it to the queue's `fail` handler (§7).
    pub fn analyze(&self, request: &AnalyzerRequest, job_id: &str) -> Result<Node> {
        let mut attempt = 0;
        loop {
            match self.invoke_once(request, job_id, attempt) {
                Ok(node) => return Ok(node),
                Err(Error::Classified(class, msg)) if class.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff(attempt, self.base_delay, self.max_delay);
                    log::warn!("analyzer attempt {attempt} for job {job_id} failed ({class:?}): {msg}; retrying in {delay:?}");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn invoke_once(&self, request: &AnalyzerRequest, job_id: &str, attempt: u32) -> Result<Node> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--session-file")
            .arg(&request.segment.session_file)
            .arg("--start-entry")
            .arg(request.segment.start.as_str())
            .arg("--end-entry")
            .arg(request.segment.end.as_str())
            .arg("--prompt-file")
            .arg(&request.prompt_file)
            .arg("--provider")
            .arg(&request.provider)
            .arg("--model")
            .arg(&request.model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(skills_dir) = &request.skills_dir {
            command.arg("--skills-dir").arg(skills_dir);
        }
        for (key, value) in &request.credentials_env {
            command.env(key, value);
        }

        let start = Instant::now();
        let mut child = command.spawn()?;

        let outcome = loop {
            if let Some(status) = child.try_wait()? {
                let stdout = read_to_string(child.stdout.take());
                let stderr = read_to_string(child.stderr.take());
                write_attempt_log(&self.logs_dir, job_id, attempt, &stdout, &stderr, start.elapsed());

                if !status.success() {
                    break ProcessOutcome::NonZeroExit { code: status.code(), stderr };
                }
                match serde_json::from_str::<Node>(&stdout) {
                    Ok(node) => return Ok(node),
                    Err(err) => break ProcessOutcome::ParseFailure(err.to_string()),
                }
            }
            if start.elapsed() >= request.timeout {
                let _ = child.kill();
                let _ = child.wait();
                write_attempt_log(&self.logs_dir, job_id, attempt, "", "timed out", start.elapsed());
                break ProcessOutcome::TimedOut;
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        let class = classify(&outcome);
        let message = match outcome {
            ProcessOutcome::NonZeroExit { stderr, .. } => stderr,
            ProcessOutcome::ParseFailure(msg) => msg,
            ProcessOutcome::TimedOut => format!("exceeded {:?} timeout", request.timeout),
        };
        Err(Error::Classified(class, message))
    }
}

fn read_to_string(pipe: Option<impl std::io::Read>) -> String {
    let Some(mut pipe) = pipe else { return String::new() };
    let mut buf = String::new();
    let _ = std::io::Read::read_to_string(&mut pipe, &mut buf);
    buf
}

impl FailureClass {
    /// Map to the §7 error-taxonomy name the queue's `fail` call
    /// records, for observability.
    pub fn taxonomy_name(self) -> &'static str {
        match self {
            FailureClass::RetryableTransient => "analyzer-transient",
            FailureClass::RetryableResource => "analyzer-transient",
            FailureClass::PermanentInput => "transcript-malformed",
            FailureClass::PermanentConfig => "environment-missing",
            FailureClass::Unknown => "analyzer-permanent",
        }
    }
}
