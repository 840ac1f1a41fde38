//! Gzip codec for cached payloads
//!
//! Compressed payloads are recognised by the two gzip magic bytes, which lets
//! readers accept a mix of compressed and raw values in the same keyspace.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

/// The first two bytes of every gzip member (RFC 1952).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors produced by [`GzipCodec`]
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("gzip compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("gzip decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
}

/// Gzip compression with a fixed level
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    level: u32,
}

impl GzipCodec {
    /// Create a codec; levels above 9 are clamped.
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    /// Compression level in use
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Compress `data` into a single gzip member.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(data).map_err(CompressionError::Compress)?;
        encoder.finish().map_err(CompressionError::Compress)
    }

    /// Decompress a gzip member.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).map_err(CompressionError::Decompress)?;
        Ok(decompressed)
    }

    /// Whether `data` starts with the gzip magic bytes.
    pub fn is_compressed(data: &[u8]) -> bool {
        data.starts_with(&GZIP_MAGIC)
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for compression.
    use super::*;

    /// Validates `GzipCodec::new` behavior for the compress decompress
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `decompressed` equals `original`.
    /// - Ensures `compressed.len() < original.len()` evaluates to true.
    /// - Ensures the output carries the gzip magic bytes.
    #[test]
    fn test_gzip_compress_decompress() {
        let codec = GzipCodec::new(6);
        let original =
            b"Hello, World! This is a test message that should compress well. ".repeat(10);

        let compressed = codec.compress(&original).unwrap();
        let decompressed = codec.decompress(&compressed).unwrap();

        assert_eq!(decompressed, original);
        assert!(compressed.len() < original.len());
        assert!(GzipCodec::is_compressed(&compressed));
    }

    /// Validates `GzipCodec::is_compressed` behavior for the raw JSON
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures JSON text is not mistaken for gzip.
    /// - Ensures an empty slice is not mistaken for gzip.
    #[test]
    fn test_raw_json_not_detected_as_gzip() {
        assert!(!GzipCodec::is_compressed(br#"{"type":"Buffer"}"#));
        assert!(!GzipCodec::is_compressed(b""));
    }

    /// Validates `GzipCodec::decompress` behavior for the corrupt member
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a truncated gzip member fails with `Decompress`.
    #[test]
    fn test_corrupt_member_fails() {
        let codec = GzipCodec::default();
        let mut compressed = codec.compress(b"payload payload payload").unwrap();
        compressed.truncate(6);

        let err = codec.decompress(&compressed).unwrap_err();
        assert!(matches!(err, CompressionError::Decompress(_)));
    }

    /// Validates `GzipCodec::new` behavior for the level clamp scenario.
    ///
    /// Assertions:
    /// - Confirms levels above 9 clamp to 9.
    #[test]
    fn test_level_clamped() {
        assert_eq!(GzipCodec::new(42).level(), 9);
        assert_eq!(GzipCodec::default().level(), 6);
    }
}
