//! Builder → Reader round trips.

use bytes::Bytes;
use http::{HeaderMap, Method, Request, header};
use http_body_util::{BodyExt, Full};
use rustls::pki_types::CertificateDer;

use crate::{
    Builder, DecodeError, Envelope, EnvelopeUrl, ForwardConfig, Host, PeerCertificates, Reader,
    RemoteAddr, build, parse,
};

fn self_signed(name: &str) -> CertificateDer<'static> {
    rcgen::generate_simple_self_signed(vec![name.to_string()])
        .unwrap()
        .cert
        .der()
        .clone()
}

async fn body_of(req: Request<Full<Bytes>>) -> Bytes {
    req.into_body().collect().await.unwrap().to_bytes()
}

struct Case {
    method: &'static str,
    uri: &'static str,
    headers: Vec<(&'static str, &'static str)>,
    body: &'static [u8],
    chain: Vec<CertificateDer<'static>>,
}

fn request_for(case: &Case) -> Request<Full<Bytes>> {
    let mut builder = Request::builder()
        .method(case.method)
        .uri(case.uri)
        .extension(Host("vault.service.consul".into()))
        .extension(RemoteAddr("192.0.2.10:51234".into()));
    for (name, value) in &case.headers {
        builder = builder.header(*name, *value);
    }
    if !case.chain.is_empty() {
        builder = builder.extension(PeerCertificates::new(case.chain.clone()));
    }
    builder.body(Full::new(Bytes::from_static(case.body))).unwrap()
}

#[tokio::test]
async fn test_round_trip_identity() {
    let client = self_signed("client.internal");
    let intermediate = self_signed("intermediate.internal");

    let cases = vec![
        Case {
            method: "GET",
            uri: "/v1/sys/health",
            headers: vec![],
            body: b"",
            chain: vec![],
        },
        Case {
            method: "POST",
            uri: "https://active.vault:8200/v1/auth/cert/login?role=web%20tier&x=1",
            headers: vec![
                ("content-type", "application/json"),
                ("x-vault-request", "true"),
                ("accept", "application/json"),
                ("accept", "text/plain"),
                ("accept", "*/*"),
            ],
            body: br#"{"name":"web"}"#,
            chain: vec![client.clone()],
        },
        Case {
            method: "PATCH",
            uri: "/v1/secret/data/app?version=3",
            headers: vec![("x-vault-token", "s.abc"), ("cookie", "a=1"), ("cookie", "b=2")],
            body: b"\x00\x01\x02\xff binary \xfe",
            chain: vec![client.clone(), intermediate.clone()],
        },
        Case {
            method: "PROPFIND",
            uri: "*",
            headers: vec![("depth", "1")],
            body: b"<propfind/>",
            chain: vec![],
        },
    ];

    for case in cases {
        let original = request_for(&case);
        let expected_headers = original.headers().clone();
        let expected_uri = original.uri().clone();

        let outbound = build(original, "http://standby.vault:8201/forward")
            .await
            .unwrap();
        let rebuilt = parse(outbound).await.unwrap();

        assert_eq!(rebuilt.method().as_str(), case.method);
        assert_eq!(rebuilt.uri(), &expected_uri);
        assert_eq!(rebuilt.headers(), &expected_headers);
        for name in expected_headers.keys() {
            let want: Vec<_> = expected_headers.get_all(name).iter().collect();
            let got: Vec<_> = rebuilt.headers().get_all(name).iter().collect();
            assert_eq!(got, want, "values for {name}");
        }
        assert_eq!(
            rebuilt.extensions().get::<Host>(),
            Some(&Host("vault.service.consul".into()))
        );
        assert_eq!(
            rebuilt.extensions().get::<RemoteAddr>(),
            Some(&RemoteAddr("192.0.2.10:51234".into()))
        );

        match rebuilt.extensions().get::<PeerCertificates>() {
            Some(chain) => assert_eq!(chain.as_slice(), &case.chain[..]),
            None => assert!(case.chain.is_empty(), "chain lost for {}", case.uri),
        }

        assert_eq!(body_of(rebuilt).await, case.body);
    }
}

#[tokio::test]
async fn test_concrete_scenario() {
    let cert_a = self_signed("a.client.internal");

    let original = Request::builder()
        .method("PUT")
        .uri("https://h/api?x=1")
        .header("X-Id", "a")
        .header("X-Id", "b")
        .extension(Host("h".into()))
        .extension(RemoteAddr("10.0.0.1:9".into()))
        .extension(PeerCertificates::new(vec![cert_a.clone()]))
        .body(Full::new(Bytes::from_static(b"payload")))
        .unwrap();

    let outbound = build(original, "http://peer/forward").await.unwrap();
    assert_eq!(outbound.method(), Method::POST);
    assert_eq!(outbound.uri(), "http://peer/forward");
    assert!(outbound.headers().is_empty());

    // Inspect the envelope the peer will see
    let (parts, body) = outbound.into_parts();
    let wire = body.collect().await.unwrap().to_bytes();
    let envelope = Envelope::decode(&wire, None).unwrap();
    assert_eq!(envelope.method, "PUT");
    assert_eq!(envelope.url, EnvelopeUrl::from_uri(&"https://h/api?x=1".parse().unwrap()));
    assert_eq!(envelope.body, "payload");
    assert_eq!(envelope.host, "h");
    assert_eq!(envelope.remote_addr, "10.0.0.1:9");
    assert_eq!(envelope.peer_certificates, vec![Bytes::copy_from_slice(cert_a.as_ref())]);

    let rebuilt = parse(Request::from_parts(parts, Full::new(wire))).await.unwrap();
    assert_eq!(rebuilt.method(), Method::PUT);
    let ids: Vec<_> = rebuilt.headers().get_all("x-id").iter().collect();
    assert_eq!(ids, ["a", "b"]);

    let chain = rebuilt.extensions().get::<PeerCertificates>().unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.leaf(), Some(&cert_a));

    assert_eq!(body_of(rebuilt).await, "payload");
}

#[tokio::test]
async fn test_empty_chain_round_trip() {
    let original = Request::builder()
        .uri("/v1/sys/leader")
        .body(Full::new(Bytes::new()))
        .unwrap();

    let outbound = build(original, "http://peer/forward").await.unwrap();
    let rebuilt = parse(outbound).await.unwrap();

    assert!(rebuilt.extensions().get::<PeerCertificates>().is_none());
    assert!(body_of(rebuilt).await.is_empty());
}

#[tokio::test]
async fn test_corrupt_certificate_attaches_nothing() {
    let good = self_signed("good.internal");
    let envelope = Envelope {
        method: "GET".into(),
        url: EnvelopeUrl::from_uri(&"/v1/auth/cert/login".parse().unwrap()),
        header: HeaderMap::new(),
        body: Bytes::new(),
        host: "h".into(),
        remote_addr: "10.0.0.1:9".into(),
        peer_certificates: vec![
            Bytes::copy_from_slice(good.as_ref()),
            Bytes::copy_from_slice(good.as_ref()),
            Bytes::from_static(b"\x30\x82\x01"),
        ],
    };
    let wire = envelope.encode(Default::default()).unwrap();

    let inbound = Request::post("/forward").body(Full::new(wire)).unwrap();
    let err = parse(inbound).await.unwrap_err();
    match err {
        DecodeError::InvalidCertificate { index, .. } => assert_eq!(index, 2),
        other => panic!("expected InvalidCertificate, got {other:?}"),
    }
}

#[tokio::test]
async fn test_obs_text_and_critical_extension_round_trip() {
    let mut params = rcgen::CertificateParams::new(vec!["ext.internal".to_string()]).unwrap();
    let mut ext =
        rcgen::CustomExtension::from_oid_content(&[1, 3, 6, 1, 4, 1, 99999, 1], vec![0x05, 0x00]);
    ext.set_criticality(true);
    params.custom_extensions.push(ext);
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap().der().clone();

    let original = Request::builder()
        .uri("/v1/kv/menu")
        .header("x-name", header::HeaderValue::from_bytes(b"caf\xe9").unwrap())
        .header("x-name", "plain")
        .extension(PeerCertificates::new(vec![cert.clone()]))
        .body(Full::new(Bytes::new()))
        .unwrap();
    let expected_headers = original.headers().clone();

    let outbound = build(original, "http://peer/forward").await.unwrap();
    let rebuilt = parse(outbound).await.unwrap();

    assert_eq!(rebuilt.headers(), &expected_headers);
    let names: Vec<_> = rebuilt
        .headers()
        .get_all("x-name")
        .iter()
        .map(|value| value.as_bytes())
        .collect();
    assert_eq!(names, [&b"caf\xe9"[..], b"plain"]);

    let chain = rebuilt.extensions().get::<PeerCertificates>().unwrap();
    assert_eq!(chain.leaf(), Some(&cert));
}

#[tokio::test]
async fn test_rebuilt_request_is_independent() {
    let original = Request::builder()
        .uri("/v1/kv/a")
        .header("x-id", "a")
        .body(Full::new(Bytes::from_static(b"payload")))
        .unwrap();
    let outbound = build(original, "http://peer/forward").await.unwrap();
    let wire = body_of(outbound).await;

    let first = parse(Request::post("/forward").body(Full::new(wire.clone())).unwrap())
        .await
        .unwrap();
    let mut second = parse(Request::post("/forward").body(Full::new(wire)).unwrap())
        .await
        .unwrap();

    second
        .headers_mut()
        .insert("x-id", header::HeaderValue::from_static("changed"));
    assert_eq!(first.headers()["x-id"], "a");

    // Draining one copy leaves the other intact
    assert_eq!(body_of(second).await, "payload");
    assert_eq!(body_of(first).await, "payload");
}

#[tokio::test]
async fn test_configured_limits_end_to_end() {
    let config = ForwardConfig::new()
        .max_body_bytes(1024)
        .max_envelope_bytes(4096);

    let original = Request::builder()
        .method("PUT")
        .uri("/v1/secret/data/big")
        .body(Full::new(Bytes::from(vec![b'x'; 1000])))
        .unwrap();
    let outbound = Builder::with_config(config)
        .build(original, "http://peer/forward")
        .await
        .unwrap();
    let rebuilt = Reader::with_config(config).parse(outbound).await.unwrap();
    assert_eq!(body_of(rebuilt).await.len(), 1000);
}
