//! Configuration Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No home directory could be determined for the current user.
    #[display("could not determine a configuration directory for the current user")]
    NoProjectDirectory,
    /// A configuration source could not be parsed, or a value has the wrong type.
    #[display("invalid configuration")]
    Invalid,
    /// The settings could not be serialized.
    #[display("could not serialize settings")]
    Serialize,
    /// The configured log directory does not exist or is not a directory.
    #[display("log directory does not exist: {}", _0.display())]
    MissingLogDirectory(#[error(not(source))] PathBuf),
    /// The settings file could not be written.
    #[display("could not write settings to {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_) | Self::MissingLogDirectory(_))
    }
}
