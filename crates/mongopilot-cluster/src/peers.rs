//! Peer RPC client.
//!
//! Every controller exposes the same read-only surface this client
//! consumes: `/health`, `/primary` and `/oplog`. An unreachable peer is an
//! abstention, never a vote: consensus tallies and oplog comparisons
//! simply see fewer responses.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mongopilot_core::OplogStamp;

/// Timeout per peer RPC.
const RPC_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeout for health probes; these gate founder eligibility, so they get
/// a little more slack than the steady-state RPCs.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// A peer's answer to `/primary`: who it believes holds primacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPrimary {
    /// `hostname:port` of the primary this peer observes, if any.
    pub primary: Option<String>,
    /// Whether the answering node itself is primary.
    #[serde(rename = "isPrimary")]
    pub is_primary: bool,
}

/// A peer's answer to `/oplog`: its latest replication position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerOplog {
    /// The peer's derived hostname.
    pub hostname: String,
    /// The peer's external address.
    pub ip: String,
    /// Latest oplog timestamp, or null when the peer has no oplog.
    pub timestamp: Option<OplogStamp>,
}

/// RPCs issued against peer controllers.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// True when the peer's controller answers its health endpoint.
    async fn health(&self, hostname: &str) -> bool;

    /// The peer's primary opinion; `None` is an abstention.
    async fn primary(&self, hostname: &str) -> Option<PeerPrimary>;

    /// The peer's oplog position; `None` is an abstention.
    async fn oplog(&self, hostname: &str) -> Option<PeerOplog>;
}

/// HTTP implementation of [`PeerClient`] over the admin API port.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    port: u16,
    http: reqwest::Client,
    health_http: reqwest::Client,
}

impl HttpPeerClient {
    /// Creates a client that reaches peers on the given API port.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be constructed.
    pub fn new(port: u16) -> Result<Self, mongopilot_core::Error> {
        let build = |timeout: Duration| {
            reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| mongopilot_core::Error::PeerRpc(e.to_string()))
        };
        Ok(Self { port, http: build(RPC_TIMEOUT)?, health_http: build(HEALTH_TIMEOUT)? })
    }

    fn url(&self, hostname: &str, endpoint: &str) -> String {
        format!("http://{}:{}/{}", hostname, self.port, endpoint)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        hostname: &str,
        endpoint: &str,
    ) -> Option<T> {
        let url = self.url(hostname, endpoint);
        let result = async {
            let response = self.http.get(&url).send().await.ok()?;
            if !response.status().is_success() {
                return None;
            }
            response.json::<T>().await.ok()
        }
        .await;

        if result.is_none() {
            counter!("mongopilot_peer_rpc_abstentions", "endpoint" => endpoint.to_string())
                .increment(1);
            debug!(url = %url, "Peer RPC abstained");
        }
        result
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn health(&self, hostname: &str) -> bool {
        let url = self.url(hostname, "health");
        match self.health_http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(url = %url, error = %err, "Health probe failed");
                false
            }
        }
    }

    async fn primary(&self, hostname: &str) -> Option<PeerPrimary> {
        self.get_json(hostname, "primary").await
    }

    async fn oplog(&self, hostname: &str) -> Option<PeerOplog> {
        self.get_json(hostname, "oplog").await
    }
}
