//! Lifecycle Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.
//!
//! Precondition failures ([`NotFound`](ErrorKind::NotFound),
//! [`AlreadyExists`](ErrorKind::AlreadyExists), [`Locked`](ErrorKind::Locked),
//! [`WrongExtension`](ErrorKind::WrongExtension)) are returned synchronously
//! before any work is scheduled. Everything else happens inside a background
//! task, where it is logged and dropped.

use derive_more::{Display, Error};
use logkeeper_compress::error::{Error as CodecError, ErrorKind as CodecErrorKind};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A lifecycle error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Target file is absent.
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Destination file is already present; refusing to clobber it.
    #[display("output file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// File is in use by another process.
    #[display("file is locked: {}", _0.display())]
    Locked(#[error(not(source))] PathBuf),
    /// File does not have the suffix the operation expects.
    #[display("unexpected file extension: {}", _0.display())]
    WrongExtension(#[error(not(source))] PathBuf),
    /// Directory could not be enumerated.
    #[display("could not list directory: {}", _0.display())]
    Listing(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Compression/decompression error
    #[display("codec error: {_0}")]
    Codec(CodecErrorKind),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Convert a codec error into a lifecycle error, keeping the codec
    /// crate's `Exn` frame as a child in the error tree.
    #[track_caller]
    pub fn codec(err: CodecError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Codec(inner))
    }

    /// Returns `true` if the failure was detected before any work was scheduled.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::AlreadyExists(_) | Self::Locked(_) | Self::WrongExtension(_)
        )
    }

    /// Returns `true` if retrying might succeed.
    ///
    /// Nothing is retried automatically; this is for callers deciding whether
    /// to offer the action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked(_) | Self::Io(_) | Self::Listing(_))
    }
}
