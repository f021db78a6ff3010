//! Outbound HTTPS client for the BMC
//!
//! BMC firmware serves a self-signed certificate that is never distributed
//! to clients, so this client accepts any server certificate. It must only
//! ever be pointed at the configured BMC.

use std::time::Duration;

use kvmrelay_common::{Error, Result};

/// Build the client used for the port lookup and for relayed assets.
///
/// Proxy environment variables are ignored; the BMC is expected to be
/// directly reachable from this host.
pub fn insecure_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy();

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| Error::Http(format!("failed to build BMC client: {}", e)))
}
