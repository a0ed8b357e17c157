//! Registry client: the authoritative list of cluster member addresses.
//!
//! The registry is an external HTTP service; this client only ever reads
//! from it. Failures are transient by policy: a reconciliation cycle that
//! cannot reach the registry keeps its last known state and tries again
//! next cycle.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use mongopilot_core::identity::strip_port;
use mongopilot_core::Error;

/// Connection timeout for registry requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total timeout for registry requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct LocationResponse {
    status: String,
    #[serde(default)]
    data: Vec<LocationEntry>,
}

#[derive(Debug, Deserialize)]
struct LocationEntry {
    ip: String,
}

/// Read-only client for the member registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    app_name: String,
    http: reqwest::Client,
}

impl RegistryClient {
    /// Creates a client for the given registry base URL and application.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, app_name: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Registry(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_name: app_name.into(),
            http,
        })
    }

    /// Fetches the current member addresses: deduplicated, ports stripped,
    /// sorted ascending by plain string compare.
    ///
    /// The sort order is part of the contract: the founder election picks
    /// the smallest address, and every node must agree on what "smallest"
    /// means.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] on network failure or an unusable body.
    /// Callers treat this as transient.
    pub async fn fetch_members(&self) -> Result<Vec<String>, Error> {
        let url = format!("{}/apps/location/{}", self.base_url, self.app_name);
        debug!(url = %url, "Fetching registry member list");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Registry(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Registry(format!("registry returned {}", response.status())));
        }

        let body: LocationResponse =
            response.json().await.map_err(|e| Error::Registry(e.to_string()))?;

        if body.status != "success" {
            warn!(status = %body.status, "Registry reported non-success status");
            return Err(Error::Registry(format!("registry status {:?}", body.status)));
        }

        Ok(normalize_members(body.data.iter().map(|e| e.ip.as_str())))
    }
}

/// Strips ports, deduplicates and sorts a raw address list.
fn normalize_members<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut members: Vec<String> = raw
        .map(strip_port)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .collect();
    members.sort();
    members.dedup();
    members
}
