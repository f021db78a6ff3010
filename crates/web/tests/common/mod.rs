//! Shared fixtures: a mock BMC served over TLS and a permissive HTTPS client

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tempfile::TempDir;

use kvmrelay_common::SessionConfig;
use kvmrelay_web::{generate_self_signed, spawn_tls, ServerHandle, TlsAcceptor};

pub const USERNAME: &str = "USERID";
pub const PASSWORD: &str = "PASSW0RD";

/// `Basic base64("USERID:PASSW0RD")`
pub const EXPECTED_AUTH: &str = "Basic VVNFUklEOlBBU1NXMFJE";

/// What the mock BMC has seen
#[derive(Default)]
pub struct BmcRecord {
    pub asset_hits: AtomicUsize,
    pub last_auth: Mutex<Option<String>>,
    pub last_uri: Mutex<Option<String>>,
    pub last_method: Mutex<Option<String>>,
    pub last_body: Mutex<Option<Vec<u8>>>,
}

impl BmcRecord {
    pub fn hits(&self) -> usize {
        self.asset_hits.load(Ordering::SeqCst)
    }
}

struct MockState {
    rp_body: String,
    record: Arc<BmcRecord>,
}

pub struct MockBmc {
    pub host: String,
    pub record: Arc<BmcRecord>,
    pub cert: PathBuf,
    pub key: PathBuf,
    handle: ServerHandle,
    _dir: TempDir,
}

impl MockBmc {
    /// Start a BMC whose rp_port endpoint answers with `rp_body`.
    pub async fn start(rp_body: &str) -> MockBmc {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        generate_self_signed(&["localhost".to_string(), "127.0.0.1".to_string()], &cert, &key)
            .unwrap();

        let record = Arc::new(BmcRecord::default());
        let state = Arc::new(MockState {
            rp_body: rp_body.to_string(),
            record: record.clone(),
        });
        let router = Router::new()
            .route("/api/providers/rp_port", get(rp_port))
            .fallback(asset)
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let acceptor = TlsAcceptor::from_pem_files(&cert, &key).unwrap();
        let handle = spawn_tls(listener, acceptor, router).unwrap();

        MockBmc {
            host: handle.local_addr().to_string(),
            record,
            cert,
            key,
            handle,
            _dir: dir,
        }
    }

    /// Session pointed at this BMC, reusing its certificate locally.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.host.clone(), USERNAME, PASSWORD)
            .with_tls_files(self.cert.clone(), self.key.clone())
            .with_settle_delay_ms(10)
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}

async fn rp_port(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    *state.record.last_auth.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.rp_body.clone(),
    )
        .into_response()
}

async fn asset(State(state): State<Arc<MockState>>, req: Request) -> Response {
    let record = &state.record;
    record.asset_hits.fetch_add(1, Ordering::SeqCst);
    *record.last_uri.lock().unwrap() = Some(req.uri().to_string());
    *record.last_method.lock().unwrap() = Some(req.method().to_string());

    let probe = req.headers().get("x-probe").cloned();
    let path = req.uri().path().to_string();
    let body = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
    *record.last_body.lock().unwrap() = Some(body.to_vec());

    if path.contains("broken") {
        return broken_response();
    }

    let status = if path.contains("missing") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    let mut resp = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .header("x-bmc-asset", "1")
        .body(Body::from(format!("asset {}", path)))
        .unwrap();
    if let Some(probe) = probe {
        resp.headers_mut().insert("x-probe-echo", probe);
    }
    resp
}

/// Sends headers and part of a body, then aborts the connection.
fn broken_response() -> Response {
    let chunks = futures::stream::unfold(0u8, |step| async move {
        match step {
            0 => Some((Ok(Bytes::from_static(b"partial")), 1)),
            1 => {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Some((Err(std::io::Error::other("asset stream failed")), 2))
            }
            _ => None,
        }
    });
    Response::new(Body::from_stream(chunks))
}

/// Client that trusts any certificate and ignores proxy settings
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn local_url(port: u16, path: &str) -> String {
    format!("https://127.0.0.1:{}{}", port, path)
}
