use std::fmt;
use std::path::PathBuf;

/// Result type for brain-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal parse errors (§4.1). A malformed trailing record is handled
/// separately by discarding it with a warning, not by returning one of
/// these.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// The file's first record was missing or did not declare itself
    /// as the header.
    MissingHeader { file: PathBuf },
    /// Two records in the same file declared the same entry id.
    DuplicateEntryId { file: PathBuf, id: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::MissingHeader { file } => {
                write!(f, "missing or invalid header record in {}", file.display())
            }
            Error::DuplicateEntryId { file, id } => {
                write!(f, "duplicate entry id '{}' in {}", id, file.display())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::MissingHeader { .. } | Error::DuplicateEntryId { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
