use std::fmt;

/// Result type for brain-types operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while constructing or validating domain values.
#[derive(Debug)]
pub enum Error {
    /// A value violated an invariant of the domain model (e.g. an empty
    /// entry id, a relevance score outside `[0, 1]`).
    InvalidValue(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidValue(msg) => write!(f, "invalid value: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
