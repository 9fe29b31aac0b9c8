use std::path::Path;
use std::time::Duration;

/// Write a per-attempt log under `<logs_dir>/<job_id>/attempt-<n>.log`
/// (§4.4: "writes a per-job analysis log under a logs directory").
/// Best-effort: a failure to write the log is not surfaced to the
/// caller since it must never mask the underlying analyzer result.
pub fn write_attempt_log(logs_dir: &Path, job_id: &str, attempt: u32, stdout: &str, stderr: &str, elapsed: Duration) {
    let dir = logs_dir.join(job_id);
    if let Err(err) = std::fs::create_dir_all(&dir) {
        log::warn!("could not create analysis log dir {}: {err}", dir.display());
        return;
    }

    let path = dir.join(format!("attempt-{attempt}.log"));
    let body = format!(
        "elapsed_ms: {}\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
        elapsed.as_millis(),
        stdout,
        stderr,
    );
    if let Err(err) = std::fs::write(&path, body) {
        log::warn!("could not write analysis log {}: {err}", path.display());
    }
}
