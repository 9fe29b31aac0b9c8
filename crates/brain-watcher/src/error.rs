#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Notify(notify::Error),
    Core(brain_core::Error),
    Store(brain_store::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Notify(err) => write!(f, "watcher error: {err}"),
            Error::Core(err) => write!(f, "parse error: {err}"),
            Error::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Notify(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Store(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Notify(err)
    }
}

impl From<brain_core::Error> for Error {
    fn from(err: brain_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<brain_store::Error> for Error {
    fn from(err: brain_store::Error) -> Self {
        Error::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
