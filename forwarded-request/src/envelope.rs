//! The forwarded request envelope.
//!
//! An [`Envelope`] is the JSON record that carries one request across a
//! process boundary:
//!
//! ```json
//! {
//!   "method": "PUT",
//!   "url": {"scheme": "https", "host": "h", "path": "/api", "raw_query": "x=1"},
//!   "header": {"x-id": ["a", "b"]},
//!   "body": "cGF5bG9hZA==",
//!   "host": "h",
//!   "remote_addr": "10.0.0.1:9",
//!   "peer_certificates": ["MIIB..."]
//! }
//! ```
//!
//! Binary fields (`body` and each certificate) are standard base64 with
//! padding. `peer_certificates` is omitted when the chain is empty; a missing,
//! `null`, or empty array all decode to an empty chain.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};

use crate::compression::{
    CompressionLevel, ENVELOPE_ENCODING, compress_envelope, decompress_envelope,
};
use crate::error::{DecodeError, EncodeError};

/// Wire record for one forwarded request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The original method.
    pub method: String,

    /// The original target, component by component.
    pub url: EnvelopeUrl,

    /// The original headers. Value order per name is preserved.
    #[serde(default, with = "header_map")]
    pub header: HeaderMap,

    /// The fully drained request body.
    #[serde(default, with = "base64_bytes")]
    pub body: Bytes,

    /// Virtual host as seen by the origin server.
    #[serde(default)]
    pub host: String,

    /// Address of the original caller.
    #[serde(default)]
    pub remote_addr: String,

    /// Raw DER of each client certificate, leaf first.
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_chain")]
    pub peer_certificates: Vec<Bytes>,
}

impl Envelope {
    /// Serialize to JSON and compress with the designated scheme.
    pub fn encode(&self, level: CompressionLevel) -> Result<Bytes, EncodeError> {
        let document = serde_json::to_vec(self)?;
        compress_envelope(&document, ENVELOPE_ENCODING, level).map_err(EncodeError::Compression)
    }

    /// Decompress and deserialize an envelope.
    ///
    /// `limit` bounds the decompressed document size.
    pub fn decode(data: &[u8], limit: Option<usize>) -> Result<Self, DecodeError> {
        let document = decompress_envelope(data, limit)?;
        serde_json::from_slice(&document).map_err(DecodeError::malformed)
    }
}

/// A request target split into its raw components.
///
/// Every component is kept exactly as received, percent-encoding included,
/// so that the target reassembles byte for byte. Unlike [`http::Uri`] this
/// also carries userinfo and a fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeUrl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    /// Opaque userinfo (`user:password`), without the trailing `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Authority host, port included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default)]
    pub path: String,

    /// Query string without the leading `?`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_query: Option<String>,

    /// Fragment without the leading `#`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl EnvelopeUrl {
    /// Split a request URI into its components.
    pub fn from_uri(uri: &Uri) -> Self {
        let (user, host) = match uri.authority() {
            Some(authority) => match authority.as_str().rsplit_once('@') {
                Some((user, host)) => (Some(user.to_owned()), Some(host.to_owned())),
                None => (None, Some(authority.as_str().to_owned())),
            },
            None => (None, None),
        };

        EnvelopeUrl {
            scheme: uri.scheme_str().map(str::to_owned),
            user,
            host,
            path: uri.path().to_owned(),
            raw_query: uri.query().map(str::to_owned),
            fragment: None,
        }
    }

    /// Reassemble an [`http::Uri`]. The fragment has no place in it and is dropped.
    pub fn to_uri(&self) -> Result<Uri, http::uri::InvalidUri> {
        self.target_string(false).parse()
    }

    fn target_string(&self, with_fragment: bool) -> String {
        let mut target = String::new();
        if let Some(scheme) = &self.scheme {
            target.push_str(scheme);
            target.push_str("://");
        }
        if let Some(user) = &self.user {
            target.push_str(user);
            target.push('@');
        }
        if let Some(host) = &self.host {
            target.push_str(host);
        }
        target.push_str(&self.path);
        if let Some(query) = &self.raw_query {
            target.push('?');
            target.push_str(query);
        }
        if with_fragment && let Some(fragment) = &self.fragment {
            target.push('#');
            target.push_str(fragment);
        }
        target
    }
}

impl fmt::Display for EnvelopeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_string(true))
    }
}

impl From<&Uri> for EnvelopeUrl {
    fn from(uri: &Uri) -> Self {
        EnvelopeUrl::from_uri(uri)
    }
}

/// Header multimap as a JSON object of name to value list.
///
/// A value that is not UTF-8 (obs-text) is written as `{"b64": "..."}` so its
/// exact bytes survive.
mod header_map {
    use std::fmt;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use http::{HeaderMap, HeaderName, HeaderValue};
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    #[serde(untagged)]
    enum ValueRef<'a> {
        Text(&'a str),
        Binary { b64: String },
    }

    impl<'a> From<&'a HeaderValue> for ValueRef<'a> {
        fn from(value: &'a HeaderValue) -> Self {
            match std::str::from_utf8(value.as_bytes()) {
                Ok(text) => ValueRef::Text(text),
                Err(_) => ValueRef::Binary {
                    b64: STANDARD.encode(value.as_bytes()),
                },
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireValue {
        Text(String),
        Binary { b64: String },
    }

    impl WireValue {
        fn into_bytes(self) -> Result<Vec<u8>, base64::DecodeError> {
            match self {
                WireValue::Text(text) => Ok(text.into_bytes()),
                WireValue::Binary { b64 } => STANDARD.decode(b64),
            }
        }
    }

    pub fn serialize<S>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(headers.keys_len()))?;
        for name in headers.keys() {
            let values: Vec<ValueRef<'_>> =
                headers.get_all(name).iter().map(ValueRef::from).collect();
            map.serialize_entry(name.as_str(), &values)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HeaderMap, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Entries>::deserialize(deserializer)?
            .map(|entries| entries.0)
            .unwrap_or_default())
    }

    struct Entries(HeaderMap);

    impl<'de> Deserialize<'de> for Entries {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_map(EntriesVisitor)
        }
    }

    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Entries;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of header names to lists of values")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Entries, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut headers = HeaderMap::new();
            while let Some((name, values)) = access.next_entry::<String, Vec<WireValue>>()? {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    <A::Error as de::Error>::custom(format!("invalid header name `{name}`"))
                })?;
                for value in values {
                    let bytes = value.into_bytes().map_err(|e| {
                        <A::Error as de::Error>::custom(format!(
                            "invalid base64 in header `{name}`: {e}"
                        ))
                    })?;
                    let value = HeaderValue::from_bytes(&bytes).map_err(|_| {
                        <A::Error as de::Error>::custom(format!("invalid value for header `{name}`"))
                    })?;
                    headers.append(name.clone(), value);
                }
            }
            Ok(Entries(headers))
        }
    }
}

/// Opaque bytes as a base64 string; `null` reads as empty.
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::de;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Bytes::new()),
            Some(encoded) => STANDARD
                .decode(encoded)
                .map(Bytes::from)
                .map_err(|e| de::Error::custom(format!("invalid base64 in body: {e}"))),
        }
    }
}

/// Certificate chain as a list of base64 strings; `null` reads as empty.
mod base64_chain {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::de;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(chain: &Vec<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(chain.len()))?;
        for der in chain {
            seq.serialize_element(&STANDARD.encode(der))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Bytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(encoded) = Option::<Vec<String>>::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };

        encoded
            .into_iter()
            .enumerate()
            .map(|(index, der)| {
                STANDARD.decode(der).map(Bytes::from).map_err(|e| {
                    de::Error::custom(format!("invalid base64 in peer certificate {index}: {e}"))
                })
            })
            .collect()
    }
}
