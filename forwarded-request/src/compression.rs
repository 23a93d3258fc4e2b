//! Envelope compression schemes and the leading format byte.
//!
//! A forwarded request body is laid out as:
//!
//! ```text
//! [format:1][payload]
//! ```
//!
//! The format byte names the scheme applied to the JSON document:
//! - `'G'`: gzip, the designated scheme written by the builder
//! - `'{'`: no compression; the byte is the first byte of the JSON itself
//!
//! The reader accepts both so that peers writing plain JSON interoperate.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{BoxedCodec, GzipCodec, IdentityCodec};
use crate::error::DecodeError;

/// Format byte marking a gzip-compressed envelope.
pub const GZIP_FORMAT_BYTE: u8 = b'G';

/// Leading byte of an uncompressed JSON envelope.
pub const JSON_FORMAT_BYTE: u8 = b'{';

/// The scheme every builder writes. Fixed for this format version.
pub const ENVELOPE_ENCODING: CompressionEncoding = CompressionEncoding::Gzip;

/// Compression schemes an envelope may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionEncoding {
    /// Plain JSON document.
    Identity,
    #[default]
    Gzip,
}

impl CompressionEncoding {
    /// Identify the scheme from the leading byte of an envelope.
    ///
    /// Returns `None` for bytes that name no known scheme.
    pub fn from_format_byte(byte: u8) -> Option<Self> {
        match byte {
            GZIP_FORMAT_BYTE => Some(Self::Gzip),
            JSON_FORMAT_BYTE => Some(Self::Identity),
            _ => None,
        }
    }

    /// The marker byte prepended to the payload, if any.
    ///
    /// Identity envelopes carry no extra byte; the JSON's own `{` is the marker.
    pub fn format_byte(&self) -> Option<u8> {
        match self {
            Self::Identity => None,
            Self::Gzip => Some(GZIP_FORMAT_BYTE),
        }
    }

    /// Get the scheme name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
        }
    }

    /// Returns true if this encoding is identity (no compression).
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Get the codec for this encoding with the specified compression level.
    pub fn codec_with_level(&self, level: CompressionLevel) -> BoxedCodec {
        match self {
            Self::Identity => BoxedCodec::new(IdentityCodec),
            Self::Gzip => BoxedCodec::new(GzipCodec::with_level(level_to_flate2(level))),
        }
    }
}

/// Compression level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Fastest compression (lowest ratio).
    Fastest,
    /// Best compression (highest ratio, slowest).
    Best,
    /// Default compression level for the algorithm.
    #[default]
    Default,
    /// Precise compression level (0-9 for gzip).
    Precise(u32),
}

impl CompressionLevel {
    /// Create a compression level with a precise value.
    pub fn precise(level: u32) -> Self {
        CompressionLevel::Precise(level)
    }
}

/// Convert CompressionLevel to flate2 gzip level (0-9).
fn level_to_flate2(level: CompressionLevel) -> u32 {
    match level {
        CompressionLevel::Fastest => 1,
        CompressionLevel::Best => 9,
        CompressionLevel::Default => 6,
        CompressionLevel::Precise(n) => n.clamp(0, 9),
    }
}

/// Compress an encoded envelope document and prefix its format byte.
pub fn compress_envelope(
    document: &[u8],
    encoding: CompressionEncoding,
    level: CompressionLevel,
) -> std::io::Result<Bytes> {
    let payload = encoding.codec_with_level(level).compress(document)?;
    let Some(marker) = encoding.format_byte() else {
        return Ok(payload);
    };

    let mut framed = BytesMut::with_capacity(1 + payload.len());
    framed.put_u8(marker);
    framed.extend_from_slice(&payload);
    Ok(framed.freeze())
}

/// Strip the format byte and decompress the envelope document.
///
/// `limit` bounds the size of the decompressed document.
pub fn decompress_envelope(data: &[u8], limit: Option<usize>) -> Result<Bytes, DecodeError> {
    let Some(&first) = data.first() else {
        return Err(DecodeError::EmptyEnvelope);
    };
    let encoding =
        CompressionEncoding::from_format_byte(first).ok_or(DecodeError::UnknownFormat(first))?;

    let payload = if encoding.is_identity() {
        data
    } else {
        &data[1..]
    };

    encoding
        .codec_with_level(CompressionLevel::Default)
        .decompress(payload, limit)
        .map_err(|source| DecodeError::Decompression { encoding, source })
}
