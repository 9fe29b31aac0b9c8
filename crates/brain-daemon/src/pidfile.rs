use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Guards against two daemon instances sharing one database (§5: "the
/// daemon takes a PID file lock at startup and refuses to start a
/// second instance against the same data directory"). Held for the
/// process lifetime; the file is removed on `Drop` so a clean shutdown
/// leaves no stale lock behind.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Acquire the lock at `path`, or return `Error::AlreadyRunning` if
    /// a live process already holds it. A PID file left behind by a
    /// process that no longer exists (crash, kill -9) is reclaimed
    /// rather than treated as a lock.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(existing) = read_pid(path)? {
            if process_is_alive(existing) {
                return Err(Error::AlreadyRunning(existing));
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, std::process::id().to_string())?;
        Ok(PidFile { path: path.to_path_buf() })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().parse::<u32>().ok()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// `kill(pid, 0)` sends no signal; it only checks whether the process
/// exists and is visible to us.
fn process_is_alive(pid: u32) -> bool {
    let res = unsafe { libc::kill(pid as i32, 0) };
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquires_a_fresh_pid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let guard = PidFile::acquire(&path).unwrap();
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn rejects_a_second_acquire_while_the_holder_is_alive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        let _guard = PidFile::acquire(&path).unwrap();
        let second = PidFile::acquire(&path);
        assert!(matches!(second, Err(Error::AlreadyRunning(_))));
    }

    #[test]
    fn reclaims_a_stale_pid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        std::fs::write(&path, "999999").unwrap();
        let guard = PidFile::acquire(&path);
        assert!(guard.is_ok());
    }
}
