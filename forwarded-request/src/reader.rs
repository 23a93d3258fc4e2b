//! Envelope reader: runs on the node receiving a forwarded call.
//!
//! Flow: drain body → decompress → decode envelope → parse certificates → rebuild

use bytes::Bytes;
use http::{Method, Request};
use http_body::Body;
use http_body_util::Full;

use crate::body::read_body;
use crate::config::ForwardConfig;
use crate::envelope::Envelope;
use crate::error::{BoxError, DecodeError};
use crate::extensions::{Host, PeerCertificates, RemoteAddr};

/// Rebuilds the original request from a forwarded call.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reader {
    config: ForwardConfig,
}

impl Reader {
    /// Create a reader with no envelope limit.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForwardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForwardConfig {
        &self.config
    }

    /// Parse the envelope carried in `req` and rebuild the original request.
    ///
    /// The rebuilt request owns its body, headers and URL outright and can be
    /// handed to the same handler that serves direct requests. Connection
    /// metadata is restored as [`Host`], [`RemoteAddr`], [`EnvelopeUrl`] and,
    /// when the original caller presented one, [`PeerCertificates`]
    /// extensions.
    ///
    /// [`EnvelopeUrl`]: crate::EnvelopeUrl
    pub async fn parse<B>(&self, req: Request<B>) -> Result<Request<Full<Bytes>>, DecodeError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let result = self.read_envelope(req).await.and_then(rebuild);
        if let Err(err) = &result {
            tracing::warn!(
                target: "forwarded_request",
                stage = %err.stage(),
                error = %err,
                "failed to parse forwarded request"
            );
        }
        result
    }

    async fn read_envelope<B>(&self, req: Request<B>) -> Result<Envelope, DecodeError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let limit = self.config.get_max_envelope_bytes();
        let wire = read_body(req.into_body(), limit).await?;
        Envelope::decode(&wire, limit)
    }
}

/// Parse a forwarded request with the default [`Reader`].
pub async fn parse<B>(req: Request<B>) -> Result<Request<Full<Bytes>>, DecodeError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    Reader::new().parse(req).await
}

/// Turn a decoded envelope into a request, all or nothing.
fn rebuild(envelope: Envelope) -> Result<Request<Full<Bytes>>, DecodeError> {
    let Envelope {
        method,
        url,
        header,
        body,
        host,
        remote_addr,
        peer_certificates,
    } = envelope;

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| DecodeError::malformed(format!("invalid method {method:?}")))?;
    let uri = url
        .to_uri()
        .map_err(|e| DecodeError::malformed(format!("invalid url {url}: {e}")))?;

    let certificate_count = peer_certificates.len();
    let peer_certificates = if peer_certificates.is_empty() {
        None
    } else {
        Some(PeerCertificates::parse(peer_certificates)?)
    };

    tracing::debug!(
        target: "forwarded_request",
        %method,
        %url,
        body_bytes = body.len(),
        peer_certificates = certificate_count,
        "parsed forwarded request"
    );

    let mut req = Request::new(Full::new(body));
    *req.method_mut() = method;
    *req.uri_mut() = uri;
    *req.headers_mut() = header;

    let extensions = req.extensions_mut();
    extensions.insert(Host(host));
    extensions.insert(RemoteAddr(remote_addr));
    extensions.insert(url);
    if let Some(chain) = peer_certificates {
        extensions.insert(chain);
    }

    Ok(req)
}
