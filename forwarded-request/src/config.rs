//! Forwarding configuration: size limits and compression level.
//!
//! Envelopes are fully buffered on both nodes, so the limits here are what
//! bounds memory per forwarded request.
//!
//! # Body vs Envelope Limits
//!
//! - **Body limit** (`max_body_bytes`): bounds the original request body the
//!   builder drains on the forwarding node.
//!
//! - **Envelope limit** (`max_envelope_bytes`): bounds the compressed envelope
//!   the reader drains on the receiving node, and the decompressed document it
//!   inflates to.

use crate::compression::CompressionLevel;

/// Configuration shared by [`Builder`](crate::Builder) and [`Reader`](crate::Reader).
///
/// By default no limits are applied and gzip runs at its default level.
///
/// # Example
///
/// ```rust
/// use forwarded_request::{CompressionLevel, ForwardConfig};
///
/// let config = ForwardConfig::new()
///     .max_body_bytes(4 * 1024 * 1024)       // 4 MB original bodies
///     .max_envelope_bytes(8 * 1024 * 1024)   // base64 inflates by a third
///     .compression_level(CompressionLevel::Fastest);
///
/// assert_eq!(config.get_max_body_bytes(), Some(4 * 1024 * 1024));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForwardConfig {
    /// Maximum size of the original request body in bytes.
    max_body_bytes: Option<usize>,
    /// Maximum size of an inbound envelope, compressed or not, in bytes.
    max_envelope_bytes: Option<usize>,
    /// Gzip level used by the builder.
    compression_level: CompressionLevel,
}

impl ForwardConfig {
    /// Create a config with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum size of the original request body.
    ///
    /// The builder fails with `BodyTooLarge` past this size.
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = Some(max);
        self
    }

    /// Set the maximum size of an inbound envelope.
    ///
    /// Applies to the body as received and to the decompressed document.
    pub fn max_envelope_bytes(mut self, max: usize) -> Self {
        self.max_envelope_bytes = Some(max);
        self
    }

    /// Set the gzip level the builder compresses with.
    pub fn compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression_level = level;
        self
    }

    /// Returns the maximum original body size, or `None` if unlimited.
    pub fn get_max_body_bytes(&self) -> Option<usize> {
        self.max_body_bytes
    }

    /// Returns the maximum envelope size, or `None` if unlimited.
    pub fn get_max_envelope_bytes(&self) -> Option<usize> {
        self.max_envelope_bytes
    }

    pub fn get_compression_level(&self) -> CompressionLevel {
        self.compression_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlimited() {
        let config = ForwardConfig::new();
        assert_eq!(config.get_max_body_bytes(), None);
        assert_eq!(config.get_max_envelope_bytes(), None);
        assert_eq!(config.get_compression_level(), CompressionLevel::Default);
    }

    #[test]
    fn test_builder_methods() {
        let config = ForwardConfig::new()
            .max_body_bytes(1024)
            .max_envelope_bytes(2048)
            .compression_level(CompressionLevel::Best);

        assert_eq!(config.get_max_body_bytes(), Some(1024));
        assert_eq!(config.get_max_envelope_bytes(), Some(2048));
        assert_eq!(config.get_compression_level(), CompressionLevel::Best);
    }
}
