//! Identity resolution: which address is this node reachable at?
//!
//! The controller cannot ask the engine (it only knows loopback) and cannot
//! trust the local interfaces (NAT). Resolution runs through a fixed
//! priority: local-testing interface, operator override, public-IP probes,
//! registry fallback. Failure here is fatal: a node that does not know its
//! own address cannot participate in membership decisions.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use mongopilot_core::{Error, NodeIdentity};

use crate::registry::RegistryClient;

/// Timeout per public-IP probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Public endpoints that echo the caller's address, tried in order.
const DEFAULT_PROBE_URLS: [&str; 2] = ["https://api.ipify.org", "https://ifconfig.me/ip"];

/// Resolves this node's externally routable address.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    local_testing: bool,
    override_address: Option<String>,
    probe_urls: Vec<String>,
    http: reqwest::Client,
}

impl IdentityResolver {
    /// Creates a resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(local_testing: bool, override_address: Option<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| Error::Identity(e.to_string()))?;

        Ok(Self {
            local_testing,
            override_address,
            probe_urls: DEFAULT_PROBE_URLS.iter().map(|s| (*s).to_string()).collect(),
            http,
        })
    }

    /// Replaces the probe endpoints. For tests.
    #[must_use]
    pub fn with_probe_urls(mut self, urls: Vec<String>) -> Self {
        self.probe_urls = urls;
        self
    }

    /// Resolves this node's identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Identity`] when every source fails or the registry
    /// is ambiguous. The controller must not proceed past this.
    pub async fn resolve(&self, registry: &RegistryClient) -> Result<NodeIdentity, Error> {
        if self.local_testing {
            let address = local_interface_address().await?;
            info!(address = %address, "Resolved identity from local interface (testing mode)");
            return Ok(NodeIdentity::new(address.to_string()));
        }

        if let Some(address) = &self.override_address {
            info!(address = %address, "Resolved identity from operator override");
            return Ok(NodeIdentity::new(address.clone()));
        }

        for url in &self.probe_urls {
            match self.probe(url).await {
                Ok(address) => {
                    info!(address = %address, probe = %url, "Resolved identity from public-IP probe");
                    return Ok(NodeIdentity::new(address.to_string()));
                }
                Err(err) => {
                    warn!(probe = %url, error = %err, "Public-IP probe failed");
                }
            }
        }

        self.resolve_from_registry(registry).await
    }

    async fn probe(&self, url: &str) -> Result<Ipv4Addr, Error> {
        let response = timeout(PROBE_TIMEOUT, self.http.get(url).send())
            .await
            .map_err(|_| Error::Identity(format!("probe {url} timed out")))?
            .map_err(|e| Error::Identity(e.to_string()))?;

        let body = response.text().await.map_err(|e| Error::Identity(e.to_string()))?;
        body.trim()
            .parse::<Ipv4Addr>()
            .map_err(|_| Error::Identity(format!("probe {url} returned invalid address")))
    }

    /// Last resort: derive identity from the registry itself.
    ///
    /// A single listed member must be us. With several members we can only
    /// proceed when one of them matches a local interface; otherwise the
    /// controller cannot tell which entry it is and must not guess.
    async fn resolve_from_registry(
        &self,
        registry: &RegistryClient,
    ) -> Result<NodeIdentity, Error> {
        let members = registry
            .fetch_members()
            .await
            .map_err(|e| Error::Identity(format!("registry fallback failed: {e}")))?;

        match members.as_slice() {
            [] => Err(Error::Identity("registry lists no members".to_string())),
            [only] => {
                info!(address = %only, "Resolved identity from single-member registry");
                Ok(NodeIdentity::new(only.clone()))
            }
            many => {
                let local = local_interface_address().await.ok().map(|a| a.to_string());
                debug!(local = ?local, candidates = many.len(), "Matching registry entries against local interface");
                if let Some(local) = local {
                    if let Some(matched) = many.iter().find(|m| **m == local) {
                        info!(address = %matched, "Resolved identity from registry match");
                        return Ok(NodeIdentity::new(matched.clone()));
                    }
                }
                Err(Error::Identity(format!(
                    "registry lists {} members and none matches a local interface",
                    many.len()
                )))
            }
        }
    }
}

/// The address of the interface holding the default route.
///
/// Connecting a UDP socket sends no packets but binds it to the outgoing
/// interface, which is exactly the address peers on the same network reach
/// us at in local-testing mode.
async fn local_interface_address() -> Result<Ipv4Addr, Error> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(Error::Io)?;
    socket.connect("8.8.8.8:53").await.map_err(Error::Io)?;
    let local = socket.local_addr().map_err(Error::Io)?;

    match local.ip() {
        IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Ok(v4),
        other => Err(Error::Identity(format!("no routable local interface (got {other})"))),
    }
}
