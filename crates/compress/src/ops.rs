//! Zstandard Operations

use crate::Codec;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{Read, Write};
use tracing::instrument;
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
// Level 1: archiving runs alongside the application producing the logs.
const DEFAULT_LEVEL: i32 = 1;

/// Zstandard codec with a fixed compression level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zstd {
    level: i32,
}
impl Default for Zstd {
    fn default() -> Self {
        Self { level: DEFAULT_LEVEL }
    }
}
impl Zstd {
    /// Create a codec with an explicit compression level.
    ///
    /// Out-of-range levels are clamped to what the linked libzstd supports.
    #[must_use]
    pub fn with_level(level: i32) -> Self {
        let range = zstd::compression_level_range();
        Self { level: level.clamp(*range.start(), *range.end()) }
    }

    #[inline]
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Verify that `bytes` start with the Zstandard frame magic number.
    #[must_use]
    pub fn check_magic_bytes(bytes: &[u8]) -> bool {
        bytes.starts_with(&ZSTD_MAGIC)
    }
}

impl Codec for Zstd {
    #[instrument(skip(self, input), fields(level = self.level, input_size = input.len(), output_size))]
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 4);
        let mut encoder = ZstdEncoder::new(&mut output, self.level).or_raise(|| ErrorKind::Encoder)?;
        encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
        encoder.finish().or_raise(|| ErrorKind::Io)?;
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }

    #[instrument(skip(self, input), fields(input_size = input.len(), output_size))]
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        if !Self::check_magic_bytes(input) {
            exn::bail!(ErrorKind::InvalidData);
        }
        let mut output = Vec::new();
        let mut decoder = ZstdDecoder::new(input).or_raise(|| ErrorKind::Encoder)?;
        decoder.read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }
}
