#[derive(Debug)]
pub enum Error {
    InvalidCron(String),
    Store(brain_store::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidCron(msg) => write!(f, "invalid cron expression: {msg}"),
            Error::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidCron(_) => None,
            Error::Store(err) => Some(err),
        }
    }
}

impl From<brain_store::Error> for Error {
    fn from(err: brain_store::Error) -> Self {
        Error::Store(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
