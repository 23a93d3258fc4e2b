//! Compression codec trait and implementations.
//!
//! This module provides the [`Codec`] trait used to compress the envelope
//! document, and the two implementations the envelope format knows about:
//! - [`GzipCodec`]: Gzip compression, the designated envelope scheme
//! - [`IdentityCodec`]: No compression (plain JSON envelopes)

use bytes::Bytes;
use std::io::{self, Read, Write};
use std::sync::Arc;

use flate2::Compression as GzipLevel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Codec trait for whole-envelope compression.
///
/// `decompress` takes an optional output limit so that a small compressed
/// envelope cannot inflate into an unbounded allocation.
///
/// # Example
///
/// ```ignore
/// use forwarded_request::Codec;
/// use bytes::Bytes;
/// use std::io;
///
/// struct Lz4Codec;
///
/// impl Codec for Lz4Codec {
///     fn name(&self) -> &'static str { "lz4" }
///
///     fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
///         // ... lz4 compression
///     }
///
///     fn decompress(&self, data: &[u8], limit: Option<usize>) -> io::Result<Bytes> {
///         // ... lz4 decompression
///     }
/// }
/// ```
pub trait Codec: Send + Sync + 'static {
    /// The scheme name, used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Compress data.
    fn compress(&self, data: &[u8]) -> io::Result<Bytes>;

    /// Decompress data, failing once the output would exceed `limit` bytes.
    fn decompress(&self, data: &[u8], limit: Option<usize>) -> io::Result<Bytes>;
}

/// A boxed codec for type-erased storage.
#[derive(Clone)]
pub struct BoxedCodec(Arc<dyn Codec>);

impl BoxedCodec {
    /// Create a new boxed codec.
    pub fn new<C: Codec>(codec: C) -> Self {
        BoxedCodec(Arc::new(codec))
    }

    /// Get the codec name.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Compress data.
    pub fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        self.0.compress(data)
    }

    /// Decompress data.
    pub fn decompress(&self, data: &[u8], limit: Option<usize>) -> io::Result<Bytes> {
        self.0.decompress(data, limit)
    }
}

impl std::fmt::Debug for BoxedCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoxedCodec").field(&self.name()).finish()
    }
}

/// Gzip codec using flate2.
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    /// Compression level (0-9). Default is 6.
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl GzipCodec {
    /// Create a new GzipCodec with the specified compression level.
    ///
    /// Level ranges from 0 (no compression) to 9 (best compression).
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        let mut encoder = GzEncoder::new(Vec::new(), GzipLevel::new(self.level));
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }

    fn decompress(&self, data: &[u8], limit: Option<usize>) -> io::Result<Bytes> {
        read_bounded(GzDecoder::new(data), limit)
    }
}

/// Identity codec (no compression).
///
/// This codec passes data through unchanged, still honoring the limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn decompress(&self, data: &[u8], limit: Option<usize>) -> io::Result<Bytes> {
        check_limit(data.len(), limit)?;
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Drain `reader`, reading at most one byte past `limit` to detect overflow.
fn read_bounded<R: Read>(mut reader: R, limit: Option<usize>) -> io::Result<Bytes> {
    let mut decompressed = Vec::new();
    match limit {
        None => {
            reader.read_to_end(&mut decompressed)?;
        }
        Some(max) => {
            reader
                .take((max as u64).saturating_add(1))
                .read_to_end(&mut decompressed)?;
            check_limit(decompressed.len(), limit)?;
        }
    }
    Ok(Bytes::from(decompressed))
}

fn check_limit(size: usize, limit: Option<usize>) -> io::Result<()> {
    if let Some(max) = limit
        && size > max
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed envelope exceeds maximum allowed size of {max} bytes"),
        ));
    }
    Ok(())
}
