//! BMC asset relay
//!
//! Serves the rendered viewer page and forwards a fixed set of viewer SDK
//! script paths to the BMC, so the browser loads them from the local origin.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::static_files::{serve_embedded, CERT_HELPER_HTML, HTML_CONTENT_TYPE};

/// Every path below this prefix is relayed
pub const SDK_PREFIX: &str = "/SDK_Pilot4/";

/// Root-level worker and helper scripts that are relayed
pub const ROOT_SCRIPTS: &[&str] = &[
    "/offscreenworker.js",
    "/mouseworker.js",
    "/utility.js",
    "/mediaTypes.js",
    "/rphandlers.js",
    "/websockethandler.js",
    "/virtualkeyboard.js",
    "/mediaworkerhandler.js",
];

/// Content type forced onto relayed `.js` responses
pub const JAVASCRIPT_MIME: &str = "application/javascript";

/// Largest request body forwarded to the BMC; larger bodies get a 500
pub const MAX_FORWARD_BODY: usize = 2 * 1024 * 1024;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether `path` is on the relay allow-list.
pub fn is_relayed_path(path: &str) -> bool {
    match path.strip_prefix(SDK_PREFIX) {
        Some(rest) => !rest.is_empty(),
        None => ROOT_SCRIPTS.contains(&path),
    }
}

/// Asset relay bound to one BMC
pub struct AssetRelay {
    bmc_host: String,
    page: Arc<str>,
    client: reqwest::Client,
}

impl AssetRelay {
    pub fn new(bmc_host: impl Into<String>, page: Arc<str>, client: reqwest::Client) -> Self {
        Self {
            bmc_host: bmc_host.into(),
            page,
            client,
        }
    }

    pub fn bmc_host(&self) -> &str {
        &self.bmc_host
    }

    /// Upstream URL for a relayed path
    pub fn upstream_url(&self, path: &str) -> String {
        format!("https://{}{}", self.bmc_host, path)
    }

    /// Build the router: `/`, `/cert.pem` and the allow-listed SDK paths.
    pub fn router(self) -> Router {
        let state = Arc::new(self);

        let mut router = Router::new()
            .route("/", any(console_page_handler))
            .route("/cert.pem", any(cert_page_handler))
            .route("/SDK_Pilot4/*path", any(proxy_handler));
        for script in ROOT_SCRIPTS {
            router = router.route(script, any(proxy_handler));
        }

        router
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Upstream URL for a relayed request, or `None` if the path falls
    /// outside the allow-list once dot segments are resolved.
    fn relayed_url(&self, path: &str) -> Option<reqwest::Url> {
        if !is_relayed_path(path) {
            return None;
        }
        let url = reqwest::Url::parse(&self.upstream_url(path)).ok()?;
        is_relayed_path(url.path()).then_some(url)
    }

    async fn forward(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let url = match self.relayed_url(parts.uri.path()) {
            Some(url) => url,
            None => {
                debug!("Refusing to relay {}", parts.uri.path());
                return not_found();
            }
        };
        let path = url.path().to_string();

        let body = match axum::body::to_bytes(body, MAX_FORWARD_BODY).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Could not read request body for {}: {}", path, e);
                return relay_error("Failed to create request");
            }
        };

        let mut headers = parts.headers;
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        strip_hop_by_hop(&mut headers);

        let request = match self
            .client
            .request(parts.method, url.clone())
            .headers(headers)
            .body(body)
            .build()
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not build BMC request for {}: {}", url, e);
                return relay_error("Failed to create request");
            }
        };

        let upstream = match self.client.execute(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!("BMC request to {} failed: {}", url, e);
                return relay_error("Failed to fetch from BMC");
            }
        };

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        if path.ends_with(".js") {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JAVASCRIPT_MIME));
        }

        let body = match upstream.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Reading BMC response from {} failed: {}", url, e);
                return relay_error("Failed to read BMC response");
            }
        };

        debug!("Relayed {} -> {} ({} bytes)", path, status, body.len());

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn relay_error(message: &'static str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

async fn console_page_handler(State(relay): State<Arc<AssetRelay>>) -> Response {
    serve_embedded(relay.page.to_string(), HTML_CONTENT_TYPE)
}

async fn cert_page_handler() -> Response {
    serve_embedded(CERT_HELPER_HTML, HTML_CONTENT_TYPE)
}

async fn proxy_handler(State(relay): State<Arc<AssetRelay>>, req: Request) -> Response {
    relay.forward(req).await
}

async fn not_found_handler() -> Response {
    not_found()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found").into_response()
}
