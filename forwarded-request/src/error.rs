//! Errors raised while building or reading a forwarded request.
//!
//! - [`EncodeError`]: failures on the forwarding node
//! - [`DecodeError`]: failures on the receiving node
//! - [`Stage`]: which step of the pipeline failed
//!
//! Every failure is terminal for the call that produced it; nothing here is
//! retried.

use http::StatusCode;

use crate::compression::CompressionEncoding;

/// Boxed error type produced by `http-body` implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline step at which an envelope operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Draining a request body.
    BodyRead,
    /// Encoding or decoding the JSON document.
    Serialization,
    /// Compressing or decompressing the document.
    Compression,
    /// Building the outbound request for the peer.
    Target,
    /// Parsing a peer certificate.
    Certificate,
}

impl Stage {
    /// Get the string representation of this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BodyRead => "body_read",
            Stage::Serialization => "serialization",
            Stage::Compression => "compression",
            Stage::Target => "target",
            Stage::Certificate => "certificate",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the envelope builder.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The original request body failed partway through.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] BoxError),

    /// The original request body is larger than the configured maximum.
    #[error("request body exceeds maximum allowed size of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The envelope could not be encoded as JSON.
    #[error("failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The encoded envelope could not be compressed.
    #[error("failed to compress envelope: {0}")]
    Compression(#[source] std::io::Error),

    /// The peer address is not a valid request target.
    #[error("invalid forwarding target {target:?}: {source}")]
    InvalidTarget {
        target: String,
        source: http::uri::InvalidUri,
    },
}

impl EncodeError {
    /// The pipeline step that failed.
    pub fn stage(&self) -> Stage {
        match self {
            EncodeError::BodyRead(_) | EncodeError::BodyTooLarge { .. } => Stage::BodyRead,
            EncodeError::Serialization(_) => Stage::Serialization,
            EncodeError::Compression(_) => Stage::Compression,
            EncodeError::InvalidTarget { .. } => Stage::Target,
        }
    }

    /// HTTP status a forwarding-aware handler should answer its caller with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EncodeError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error returned by the envelope reader.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The inbound envelope body failed partway through.
    #[error("failed to read envelope body: {0}")]
    BodyRead(#[source] BoxError),

    /// The inbound envelope is larger than the configured maximum.
    #[error("envelope exceeds maximum allowed size of {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The inbound body is empty.
    #[error("envelope is empty")]
    EmptyEnvelope,

    /// The leading byte names no known compression scheme.
    #[error("unknown envelope format byte: 0x{0:02x}")]
    UnknownFormat(u8),

    /// The payload is not valid for its compression scheme, or inflates past the limit.
    #[error("failed to decompress {} envelope: {source}", encoding.as_str())]
    Decompression {
        encoding: CompressionEncoding,
        source: std::io::Error,
    },

    /// The document is not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] BoxError),

    /// A peer certificate is not a well-formed X.509 certificate.
    #[error("invalid peer certificate at index {index}: {source}")]
    InvalidCertificate {
        index: usize,
        source: x509_cert::der::Error,
    },
}

impl DecodeError {
    pub(crate) fn malformed<E: Into<BoxError>>(err: E) -> Self {
        DecodeError::MalformedEnvelope(err.into())
    }

    /// The pipeline step that failed.
    pub fn stage(&self) -> Stage {
        match self {
            DecodeError::BodyRead(_) | DecodeError::BodyTooLarge { .. } => Stage::BodyRead,
            DecodeError::EmptyEnvelope
            | DecodeError::UnknownFormat(_)
            | DecodeError::Decompression { .. } => Stage::Compression,
            DecodeError::MalformedEnvelope(_) => Stage::Serialization,
            DecodeError::InvalidCertificate { .. } => Stage::Certificate,
        }
    }

    /// HTTP status a forwarding-aware handler should answer its caller with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DecodeError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
