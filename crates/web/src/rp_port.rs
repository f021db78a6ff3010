//! Remote-presence port discovery
//!
//! The BMC reports the port its KVM protocol listens on through its
//! management API. The answer is advisory: any failure falls back to
//! [`DEFAULT_RP_PORT`].

use serde::Deserialize;
use tracing::{debug, warn};

use kvmrelay_common::{Error, Result, DEFAULT_RP_PORT, RP_PORT_API_PATH};

#[derive(Debug, Deserialize)]
struct RpPortResponse {
    #[serde(default)]
    port: Option<i64>,
}

/// Ask the BMC for its remote-presence port.
///
/// The HTTP status is not inspected; only the decoded body matters.
pub async fn query_rp_port(
    client: &reqwest::Client,
    bmc_host: &str,
    username: &str,
    password: &str,
) -> Result<u16> {
    let url = format!("https://{}{}", bmc_host, RP_PORT_API_PATH);
    debug!("Querying remote presence port at {}", url);

    let resp = client
        .get(&url)
        .basic_auth(username, Some(password))
        .send()
        .await
        .map_err(|e| Error::RpLookup(format!("request to {} failed: {}", url, e)))?;

    let body: RpPortResponse = resp
        .json()
        .await
        .map_err(|e| Error::RpLookup(format!("invalid response body: {}", e)))?;

    match body.port {
        Some(port) if port > 0 => u16::try_from(port)
            .map_err(|_| Error::RpLookup(format!("port {} out of range", port))),
        Some(port) => Err(Error::RpLookup(format!("non-positive port {}", port))),
        None => Err(Error::RpLookup("response has no port field".to_string())),
    }
}

/// Like [`query_rp_port`], but never fails.
pub async fn resolve_rp_port(
    client: &reqwest::Client,
    bmc_host: &str,
    username: &str,
    password: &str,
) -> u16 {
    match query_rp_port(client, bmc_host, username, password).await {
        Ok(port) => port,
        Err(e) => {
            warn!(
                "Could not get remote presence port from {}, using default {}: {}",
                bmc_host, DEFAULT_RP_PORT, e
            );
            DEFAULT_RP_PORT
        }
    }
}
