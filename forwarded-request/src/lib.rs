//! Request forwarding between cluster nodes.
//!
//! A node that cannot serve a request captures it (method, target, headers,
//! body, caller address and TLS client certificates) into an [`Envelope`],
//! and POSTs that envelope to a peer. The peer rebuilds an equivalent request
//! and hands it to its ordinary handler.
//!
//! ```ignore
//! // On the forwarding node
//! let outbound = forwarded_request::build(req, "https://peer:8201/forward").await?;
//!
//! // On the receiving node
//! let rebuilt = forwarded_request::parse(inbound).await?;
//! ```
//!
//! ## Modules
//!
//! - [`builder`]: Capture a request into a POST carrying its envelope
//! - [`reader`]: Rebuild a request from a received envelope
//! - [`envelope`]: The wire record and its JSON representation
//! - [`extensions`]: Connection metadata carried in request extensions
//! - [`codec`]: Compression codec trait and implementations
//! - [`compression`]: Envelope compression schemes and format byte
//! - [`config`]: Size limits and compression level
//! - [`error`]: Encode and decode error types

mod body;
pub mod builder;
pub mod codec;
pub mod compression;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extensions;
pub mod reader;

#[cfg(test)]
mod tests;

pub use builder::{Builder, build};
pub use codec::{BoxedCodec, Codec, GzipCodec, IdentityCodec};
pub use compression::{
    CompressionEncoding, CompressionLevel, ENVELOPE_ENCODING, compress_envelope,
    decompress_envelope,
};
pub use config::ForwardConfig;
pub use envelope::{Envelope, EnvelopeUrl};
pub use error::{BoxError, DecodeError, EncodeError, Stage};
pub use extensions::{Host, PeerCertificates, RemoteAddr};
pub use reader::{Reader, parse};
