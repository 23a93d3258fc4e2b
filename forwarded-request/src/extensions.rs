//! Connection metadata carried in request extensions.
//!
//! `http::Request` has no slot for the caller's address, the virtual host the
//! origin server resolved, or the TLS client certificate chain. The server
//! stack stores these as extensions; the builder reads them from there and the
//! reader puts them back.

use std::net::SocketAddr;

use bytes::Bytes;
use rustls::pki_types::CertificateDer;
use x509_cert::Certificate;
use x509_cert::der::Decode;

use crate::error::DecodeError;

/// Textual network address of the original caller, e.g. `"10.0.0.1:9"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr(pub String);

impl From<SocketAddr> for RemoteAddr {
    fn from(addr: SocketAddr) -> Self {
        RemoteAddr(addr.to_string())
    }
}

/// Virtual host as seen by the origin server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host(pub String);

/// Client certificate chain presented during mutual TLS, leaf first.
///
/// On the forwarding node this is inserted by the TLS acceptor. On the
/// receiving node the reader only inserts it after every entry decoded as a
/// DER X.509 certificate. Contents are not checked: any version, extension
/// or signature the TLS layer accepted is carried as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerCertificates(Vec<CertificateDer<'static>>);

impl PeerCertificates {
    /// Wrap a chain handed over by the TLS layer.
    pub fn new(chain: Vec<CertificateDer<'static>>) -> Self {
        PeerCertificates(chain)
    }

    /// Parse raw DER entries, in order.
    ///
    /// Fails on the first entry that is not a well-formed certificate,
    /// reporting its position in the chain.
    pub fn parse<I>(raw: I) -> Result<Self, DecodeError>
    where
        I: IntoIterator<Item = Bytes>,
    {
        let mut chain = Vec::new();
        for (index, der) in raw.into_iter().enumerate() {
            Certificate::from_der(&der)
                .map_err(|source| DecodeError::InvalidCertificate { index, source })?;
            chain.push(CertificateDer::from(der.to_vec()));
        }
        Ok(PeerCertificates(chain))
    }

    /// The end-entity certificate, if any.
    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[CertificateDer<'static>] {
        &self.0
    }

    /// Raw DER bytes of each certificate, in chain order.
    pub fn to_raw(&self) -> Vec<Bytes> {
        self.0
            .iter()
            .map(|cert| Bytes::copy_from_slice(cert.as_ref()))
            .collect()
    }

    pub fn into_inner(self) -> Vec<CertificateDer<'static>> {
        self.0
    }
}

impl From<Vec<CertificateDer<'static>>> for PeerCertificates {
    fn from(chain: Vec<CertificateDer<'static>>) -> Self {
        PeerCertificates(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed(name: &str) -> CertificateDer<'static> {
        rcgen::generate_simple_self_signed(vec![name.to_string()])
            .unwrap()
            .cert
            .der()
            .clone()
    }

    #[test]
    fn test_remote_addr_from_socket_addr() {
        let addr: SocketAddr = "10.0.0.1:9".parse().unwrap();
        assert_eq!(RemoteAddr::from(addr), RemoteAddr("10.0.0.1:9".into()));
    }

    #[test]
    fn test_parse_keeps_chain_order() {
        let leaf = self_signed("leaf.internal");
        let issuer = self_signed("issuer.internal");

        let chain = PeerCertificates::parse(vec![
            Bytes::copy_from_slice(leaf.as_ref()),
            Bytes::copy_from_slice(issuer.as_ref()),
        ])
        .unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.leaf(), Some(&leaf));
        assert_eq!(chain.as_slice()[1], issuer);
        assert_eq!(chain.to_raw()[1].as_ref(), issuer.as_ref());
    }

    #[test]
    fn test_parse_reports_offending_index() {
        let leaf = self_signed("leaf.internal");

        let err = PeerCertificates::parse(vec![
            Bytes::copy_from_slice(leaf.as_ref()),
            Bytes::from_static(b"definitely not DER"),
        ])
        .unwrap_err();

        assert!(matches!(err, DecodeError::InvalidCertificate { index: 1, .. }));
    }

    #[test]
    fn test_parse_accepts_unknown_critical_extension() {
        let mut params = rcgen::CertificateParams::new(vec!["ext.internal".to_string()]).unwrap();
        let mut ext = rcgen::CustomExtension::from_oid_content(
            &[1, 3, 6, 1, 4, 1, 99999, 1],
            vec![0x05, 0x00],
        );
        ext.set_criticality(true);
        params.custom_extensions.push(ext);
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap().der().clone();

        let chain = PeerCertificates::parse(vec![Bytes::copy_from_slice(cert.as_ref())]).unwrap();
        assert_eq!(chain.leaf(), Some(&cert));
    }

    #[test]
    fn test_parse_rejects_trailing_bytes() {
        let leaf = self_signed("leaf.internal");
        let mut der = leaf.as_ref().to_vec();
        der.push(0x00);

        let err = PeerCertificates::parse(vec![Bytes::from(der)]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidCertificate { index: 0, .. }));
    }

    #[test]
    fn test_parse_empty() {
        let chain = PeerCertificates::parse(Vec::new()).unwrap();
        assert!(chain.is_empty());
        assert!(chain.leaf().is_none());
    }
}
