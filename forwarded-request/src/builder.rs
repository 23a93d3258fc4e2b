//! Envelope builder: runs on the node that decides to forward.
//!
//! Flow: validate target → drain body → capture envelope → encode → POST

use bytes::Bytes;
use http::request::Parts;
use http::{Method, Request, Uri, header};
use http_body::Body;
use http_body_util::Full;

use crate::body::read_body;
use crate::config::ForwardConfig;
use crate::envelope::{Envelope, EnvelopeUrl};
use crate::error::{BoxError, EncodeError};
use crate::extensions::{Host, PeerCertificates, RemoteAddr};

/// Turns a live request into a POST carrying its envelope.
#[derive(Clone, Copy, Debug, Default)]
pub struct Builder {
    config: ForwardConfig,
}

impl Builder {
    /// Create a builder with no body limit and default compression.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForwardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForwardConfig {
        &self.config
    }

    /// Capture `req` into an envelope and wrap it in a POST to `target`.
    ///
    /// The original request is consumed; its body cannot be read again. The
    /// outbound request carries no headers of its own; the original headers
    /// travel inside the envelope.
    pub async fn build<B>(
        &self,
        req: Request<B>,
        target: &str,
    ) -> Result<Request<Full<Bytes>>, EncodeError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let target_uri: Uri = target.parse().map_err(|source| EncodeError::InvalidTarget {
            target: target.to_owned(),
            source,
        })?;

        let (parts, body) = req.into_parts();
        let body = read_body(body, self.config.get_max_body_bytes()).await?;
        let envelope = capture(parts, body);
        let encoded = envelope.encode(self.config.get_compression_level())?;

        tracing::debug!(
            target: "forwarded_request",
            method = %envelope.method,
            url = %envelope.url,
            %target_uri,
            body_bytes = envelope.body.len(),
            envelope_bytes = encoded.len(),
            peer_certificates = envelope.peer_certificates.len(),
            "built forwarded request"
        );

        let mut outbound = Request::new(Full::new(encoded));
        *outbound.method_mut() = Method::POST;
        *outbound.uri_mut() = target_uri;
        Ok(outbound)
    }
}

/// Build a forwarded request with the default [`Builder`].
pub async fn build<B>(req: Request<B>, target: &str) -> Result<Request<Full<Bytes>>, EncodeError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    Builder::new().build(req, target).await
}

/// Move the request head and drained body into an envelope.
fn capture(parts: Parts, body: Bytes) -> Envelope {
    let host = virtual_host(&parts);
    let remote_addr = parts
        .extensions
        .get::<RemoteAddr>()
        .map(|addr| addr.0.clone())
        .unwrap_or_default();
    let peer_certificates = parts
        .extensions
        .get::<PeerCertificates>()
        .map(PeerCertificates::to_raw)
        .unwrap_or_default();

    Envelope {
        method: parts.method.as_str().to_owned(),
        url: EnvelopeUrl::from_uri(&parts.uri),
        header: parts.headers,
        body,
        host,
        remote_addr,
        peer_certificates,
    }
}

/// Host extension first, then the Host header, then the URI authority.
fn virtual_host(parts: &Parts) -> String {
    if let Some(Host(host)) = parts.extensions.get::<Host>() {
        return host.clone();
    }
    if let Some(host) = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
    {
        return host.to_owned();
    }
    parts
        .uri
        .authority()
        .map(|authority| authority.as_str().to_owned())
        .unwrap_or_default()
}
