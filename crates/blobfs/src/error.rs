//! Error taxonomy and translation of backend failures

use thiserror::Error;

/// The kind of a [`BlobFsError`], stable enough to branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The container or object does not exist
    NotFound,
    /// The request itself is malformed (bad path, directory used as file, bad offset)
    InvalidArgument,
    /// The handle was already closed
    InvalidState,
    /// Any other backend or transport failure
    Io,
}

/// Errors surfaced by the blob filesystem
#[derive(Error, Debug)]
pub enum BlobFsError {
    /// Object or container absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed path, directory-shaped path used as a file, or out-of-range position
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted on a closed handle
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Backend or transport failure, with the backend's diagnostic text
    #[error("IO error: {0}")]
    Io(String),
}

impl BlobFsError {
    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlobFsError::NotFound(_) => ErrorKind::NotFound,
            BlobFsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BlobFsError::InvalidState(_) => ErrorKind::InvalidState,
            BlobFsError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error belongs to the I/O category (not-found is reported as I/O to callers)
    pub fn is_io(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Io)
    }

    pub(crate) fn closed(operation: &str) -> Self {
        BlobFsError::InvalidState(format!("cannot {} on a closed file", operation))
    }
}

/// Result type for blob filesystem operations
pub type Result<T> = std::result::Result<T, BlobFsError>;

/// Map a backend error onto the filesystem taxonomy.
///
/// `context` names the operation and path, e.g. `"read c/obj"`.
pub(crate) fn translate(err: object_store::Error, context: &str) -> BlobFsError {
    match err {
        object_store::Error::NotFound { path, .. } => {
            BlobFsError::NotFound(format!("{}: '{}' does not exist", context, path))
        }
        object_store::Error::InvalidPath { source } => {
            BlobFsError::InvalidArgument(format!("{}: {}", context, source))
        }
        other => BlobFsError::Io(format!("{}: {}", context, other)),
    }
}

impl From<BlobFsError> for std::io::Error {
    fn from(err: BlobFsError) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFound => std::io::ErrorKind::NotFound,
            ErrorKind::InvalidArgument => std::io::ErrorKind::InvalidInput,
            ErrorKind::InvalidState | ErrorKind::Io => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
