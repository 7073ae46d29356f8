//! Byte-level codecs for archiving log files.
//!
//! The lifecycle engine treats compression as a black box: whole-file bytes
//! go in, whole-file bytes come out, and either direction may fail. This crate
//! provides that boundary as the [`Codec`] trait, plus the [`Zstd`]
//! implementation used for `.zst` archives.
//!
//! Unlike a general-purpose archiver, the default level favours speed over
//! ratio: log rotation happens while the host application is running, and
//! a fast level keeps background work short.

pub mod error;
mod ops;

pub use crate::ops::Zstd;
use crate::error::Result;
use std::sync::Arc;

/// Shared, thread-safe handle to a codec.
pub type CodecHandle = Arc<dyn Codec>;

/// An in-memory, whole-buffer compression format.
pub trait Codec: Send + Sync {
    /// Compress a byte slice in memory.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a byte slice in memory.
    ///
    /// Input that does not look like this codec's output is rejected with
    /// [`InvalidData`](crate::error::ErrorKind::InvalidData).
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;
}
