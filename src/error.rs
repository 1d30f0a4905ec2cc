use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the flush pipeline and its collaborators.
///
/// I/O failures are captured as `(io::ErrorKind, message)` rather than the
/// original `io::Error` so the type stays `Clone`: iterators keep a sticky
/// status that may be reported more than once.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The output table file could not be created.
    #[error("create {path:?} failed: {message}")]
    CreateFailed {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },
    /// The table writer failed while appending to the file.
    #[error("write failed: {0}")]
    WriteFailed(String),
    /// Flushing the finished file to stable storage failed.
    #[error("sync failed: {0}")]
    SyncFailed(String),
    /// Closing the finished file failed.
    #[error("close failed: {0}")]
    CloseFailed(String),
    /// The freshly written table did not read back cleanly.
    #[error("verification of table {file_id} failed: {reason}")]
    VerificationFailed { file_id: u64, reason: String },
    /// The source record stream reported a fault.
    #[error("source stream failed: {0}")]
    SourceStream(String),
    /// An internal invariant was broken (ordering, sizes, key encoding).
    #[error("integrity violation: {0}")]
    Integrity(String),
    /// On-disk data failed to decode (bad checksum, magic, truncation).
    #[error("corruption: {0}")]
    Corruption(String),
    /// Plain I/O error from the storage backend.
    #[error("IO error: {message}")]
    Io { kind: io::ErrorKind, message: String },
}

/// The tag of an [`Error`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    IoCreateFailed,
    IoWriteFailed,
    IoSyncFailed,
    IoCloseFailed,
    VerificationFailed,
    SourceStreamFailed,
    IntegrityViolation,
    Corruption,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CreateFailed { .. } => ErrorKind::IoCreateFailed,
            Error::WriteFailed(_) => ErrorKind::IoWriteFailed,
            Error::SyncFailed(_) => ErrorKind::IoSyncFailed,
            Error::CloseFailed(_) => ErrorKind::IoCloseFailed,
            Error::VerificationFailed { .. } => ErrorKind::VerificationFailed,
            Error::SourceStream(_) => ErrorKind::SourceStreamFailed,
            Error::Integrity(_) => ErrorKind::IntegrityViolation,
            Error::Corruption(_) => ErrorKind::Corruption,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn create_failed(path: impl Into<PathBuf>, err: Error) -> Self {
        let path = path.into();
        match err {
            Error::Io { kind, message } => Error::CreateFailed {
                path,
                kind,
                message,
            },
            other => Error::CreateFailed {
                path,
                kind: io::ErrorKind::Other,
                message: other.to_string(),
            },
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
