use std::fmt;

/// Result type for brain-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The store's error model (§4.3): all four variants are safe to
/// retry except `NotFound` and `Conflict`, which are definite.
#[derive(Debug)]
pub enum Error {
    /// No row/blob matches the requested id.
    NotFound(String),
    /// A unique-constraint violation on an idempotent path, i.e. a
    /// concurrent writer got there first.
    Conflict(String),
    /// An optional capability (vector index, full-text index) is not
    /// present in this database.
    Unavailable(String),
    /// Database operation failed for a reason that isn't one of the
    /// above.
    Database(rusqlite::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Storage fault not otherwise classified.
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::Conflict(what) => write!(f, "conflict: {what}"),
            Error::Unavailable(what) => write!(f, "unavailable: {what}"),
            Error::Database(err) => write!(f, "database error: {err}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::NotFound(_) | Error::Conflict(_) | Error::Unavailable(_) | Error::Internal(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound(err.to_string()),
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Conflict(err.to_string())
            }
            _ => Error::Database(err),
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
