use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// The daemon's error model. `Config` is the only variant the daemon
/// treats as fatal at startup (§7: "config-invalid — fatal, surfaced
/// at startup"); everything else bubbles up from a component that
/// already owns its own retry/backoff policy.
#[derive(Debug)]
pub enum Error {
    Config(String),
    Io(std::io::Error),
    AlreadyRunning(u32),
    Store(brain_store::Error),
    Watcher(brain_watcher::Error),
    Worker(brain_worker::Error),
    Scheduler(brain_scheduler::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::AlreadyRunning(pid) => write!(f, "daemon already running (pid {pid})"),
            Error::Store(err) => write!(f, "store error: {err}"),
            Error::Watcher(err) => write!(f, "watcher error: {err}"),
            Error::Worker(err) => write!(f, "worker error: {err}"),
            Error::Scheduler(err) => write!(f, "scheduler error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(_) | Error::AlreadyRunning(_) => None,
            Error::Io(err) => Some(err),
            Error::Store(err) => Some(err),
            Error::Watcher(err) => Some(err),
            Error::Worker(err) => Some(err),
            Error::Scheduler(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<brain_store::Error> for Error {
    fn from(err: brain_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<brain_watcher::Error> for Error {
    fn from(err: brain_watcher::Error) -> Self {
        Error::Watcher(err)
    }
}

impl From<brain_worker::Error> for Error {
    fn from(err: brain_worker::Error) -> Self {
        Error::Worker(err)
    }
}

impl From<brain_scheduler::Error> for Error {
    fn from(err: brain_scheduler::Error) -> Self {
        Error::Scheduler(err)
    }
}
