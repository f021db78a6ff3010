//! Embedded static pages

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Content type for both embedded pages
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Helper page the viewer SDK opens at `/cert.pem`. It tells the opener
/// window that certificate acceptance finished and then closes itself.
pub const CERT_HELPER_HTML: &str = include_str!("../assets/cert.html");

pub fn serve_embedded<B>(content: B, content_type: &'static str) -> Response
where
    B: IntoResponse,
{
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        content,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cert_helper_notifies_opener() {
        assert!(CERT_HELPER_HTML.contains("postMessage('CERT_ACCEPTED'"));
        assert!(CERT_HELPER_HTML.contains("rpCertAccepted"));
        assert!(CERT_HELPER_HTML.contains("window.close()"));
    }

    #[test]
    fn test_serve_embedded_sets_content_type() {
        let resp = serve_embedded(CERT_HELPER_HTML, HTML_CONTENT_TYPE);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            HTML_CONTENT_TYPE
        );
    }
}
