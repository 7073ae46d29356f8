//! Binary Error Types

use derive_more::{Display, Error};

/// A top-level error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for the command-line entry point.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Settings could not be located, loaded, or saved.
    #[display("configuration error")]
    Config,
    /// The async runtime could not be started.
    #[display("could not start runtime")]
    Runtime,
    /// The log directory could not be read, or an operation was rejected.
    #[display("log maintenance failed")]
    Lifecycle,
}
