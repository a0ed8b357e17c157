//! Node identity and hostname derivation.
//!
//! Every cluster member is addressed through a derived hostname rather than
//! its raw IP. NAT hairpinning usually fails, so a node cannot reach its own
//! public address; the hosts file maps the node's own hostname to loopback
//! and every peer's hostname to that peer's public address. Replica-set
//! configuration only ever sees hostnames.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Prefix of every derived hostname.
pub const HOSTNAME_PREFIX: &str = "mongo-";

/// Domain suffix of every derived hostname.
pub const HOSTNAME_SUFFIX: &str = ".mongo-cluster";

/// This node's identity, fixed at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Externally routable IPv4 address, as reported by the registry
    /// or the public-IP probes.
    pub address: String,

    /// Hostname derived from the address; see [`hostname_for`].
    pub hostname: String,
}

impl NodeIdentity {
    /// Creates an identity from an external address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        let hostname = hostname_for(&address);
        Self { address, hostname }
    }

    /// Returns the `host:port` form used in replica-set member documents.
    #[must_use]
    pub fn engine_host(&self, port: u16) -> String {
        format!("{}:{}", self.hostname, port)
    }
}

/// Derives the cluster hostname for an IPv4 address.
///
/// `10.0.0.1` becomes `mongo-10-0-0-1.mongo-cluster`. The mapping is total
/// and injective on dotted-quad addresses: dashes only ever replace dots.
#[must_use]
pub fn hostname_for(address: &str) -> String {
    format!("{}{}{}", HOSTNAME_PREFIX, address.replace('.', "-"), HOSTNAME_SUFFIX)
}

/// Inverse of [`hostname_for`].
///
/// Returns the address only for hostnames this controller could have
/// produced: correct prefix and suffix, and a valid IPv4 address between
/// them.
#[must_use]
pub fn address_for_hostname(hostname: &str) -> Option<String> {
    let inner = hostname.strip_prefix(HOSTNAME_PREFIX)?.strip_suffix(HOSTNAME_SUFFIX)?;
    let address = inner.replace('-', ".");
    address.parse::<Ipv4Addr>().ok()?;
    Some(address)
}

/// Strips an optional `:port` from an address string.
///
/// Registry entries sometimes carry the application port; member comparison
/// and hostname derivation always work on the bare address.
#[must_use]
pub fn strip_port(address: &str) -> &str {
    match address.split_once(':') {
        Some((host, _)) => host,
        None => address,
    }
}
