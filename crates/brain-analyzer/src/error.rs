use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// The subprocess exited or produced output that could not be
    /// classified into a retry decision; see [`crate::FailureClass`].
    Classified(crate::FailureClass, String),
    /// An embedding provider's HTTP call failed (connection refused,
    /// non-2xx status, ...).
    EmbeddingRequest(String),
    /// An embedding provider answered but its body did not match the
    /// shape this client expects.
    EmbeddingResponse(String),
    /// A non-`mock` embedding provider is configured without the
    /// credential it needs.
    MissingCredential(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Classified(class, msg) => write!(f, "{class:?}: {msg}"),
            Error::EmbeddingRequest(msg) => write!(f, "embedding request failed: {msg}"),
            Error::EmbeddingResponse(msg) => write!(f, "embedding response malformed: {msg}"),
            Error::MissingCredential(model) => {
                write!(f, "no credential configured for embedding model {model}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Classified(..) => None,
            Error::EmbeddingRequest(_) => None,
            Error::EmbeddingResponse(_) => None,
            Error::MissingCredential(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
