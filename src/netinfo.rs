//! Passthrough lookup of the host's public network information.
//!
//! Thin wrapper around `https://ipinfo.io/json`; no caching, no retries.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const NETWORK_INFO_URL: &str = "https://ipinfo.io/json";

/// Public-facing network identity as reported by the lookup service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Public IP address.
    #[serde(default)]
    pub ip: Option<String>,
    /// City of the egress point.
    #[serde(default)]
    pub city: Option<String>,
    /// Region of the egress point.
    #[serde(default)]
    pub region: Option<String>,
    /// Country code of the egress point.
    #[serde(default)]
    pub country: Option<String>,
}

/// Errors from the network-information lookup.
#[derive(Debug, Error)]
pub enum NetInfoError {
    /// The lookup request failed or its JSON body could not be parsed.
    #[error("failed to fetch network information: {source}")]
    Request {
        /// The underlying transport or decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The lookup service answered with a non-success status.
    #[error("failed to fetch network information: HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },
}

/// Fetches the current public network information.
///
/// # Errors
///
/// Returns [`NetInfoError`] when the service is unreachable, answers with a
/// non-success status, or returns a malformed body.
pub async fn lookup(client: &reqwest::Client) -> Result<NetworkInfo, NetInfoError> {
    lookup_at(client, NETWORK_INFO_URL).await
}

async fn lookup_at(client: &reqwest::Client, url: &str) -> Result<NetworkInfo, NetInfoError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| NetInfoError::Request { source })?;

    let status = response.status();
    if !status.is_success() {
        return Err(NetInfoError::HttpStatus {
            status: status.as_u16(),
        });
    }

    let info: NetworkInfo = response
        .json()
        .await
        .map_err(|source| NetInfoError::Request { source })?;
    debug!(ip = ?info.ip, "network info fetched");
    Ok(info)
}
