//! Hosts-file management.
//!
//! The hostname indirection lives here: this node's own hostname resolves
//! to loopback (NAT hairpinning would break anything else) while peer
//! hostnames resolve to their external addresses. Entries are only ever
//! appended, and only when the hostname is not already present, so both
//! bootstrap and the reconciler can call these operations freely.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use mongopilot_core::config::HostsConfig;
use mongopilot_core::identity::hostname_for;
use mongopilot_core::{NodeIdentity, Result};

/// Loopback address used for the self entry in production.
const LOOPBACK: &str = "127.0.0.1";

/// Maintains local name→address mappings for self and peers.
#[derive(Debug, Clone)]
pub struct HostsManager {
    hosts_path: PathBuf,
    nsswitch_path: PathBuf,
}

impl HostsManager {
    /// Creates a manager over the configured paths.
    #[must_use]
    pub fn new(config: &HostsConfig) -> Self {
        Self {
            hosts_path: config.hosts_path.clone(),
            nsswitch_path: config.nsswitch_path.clone(),
        }
    }

    /// Ensures this node's hostname resolves locally.
    ///
    /// Production maps it to loopback; local-testing mode maps it to the
    /// node's private address so several controllers can share a machine.
    /// This is the only hostname that ever maps to loopback.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn ensure_self_entry(
        &self,
        identity: &NodeIdentity,
        local_testing: bool,
    ) -> Result<bool> {
        let target = if local_testing { identity.address.as_str() } else { LOOPBACK };
        self.ensure_entry(target, &identity.hostname)
    }

    /// Ensures a peer's hostname resolves to its external address.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn ensure_peer_entry(&self, address: &str) -> Result<bool> {
        self.ensure_entry(address, &hostname_for(address))
    }

    /// Ensures entries for every peer address, skipping self. Returns how
    /// many entries were added.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn ensure_peer_entries(&self, addresses: &[String], self_address: &str) -> Result<usize> {
        let mut added = 0;
        for address in addresses {
            if address == self_address {
                continue;
            }
            if self.ensure_peer_entry(address)? {
                added += 1;
            }
        }
        if added > 0 {
            info!(added = added, "Added peer hosts entries");
        }
        Ok(added)
    }

    fn ensure_entry(&self, address: &str, hostname: &str) -> Result<bool> {
        let content = match fs::read_to_string(&self.hosts_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        if contains_hostname(&content, hostname) {
            return Ok(false);
        }

        let mut updated = content;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&format!("{address} {hostname}\n"));
        fs::write(&self.hosts_path, updated)?;

        debug!(address = address, hostname = hostname, "Added hosts entry");
        Ok(true)
    }

    /// Rewrites the name-service switch so the hosts file is consulted
    /// before DNS. One-shot at startup.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn prefer_hosts_lookup(&self) -> Result<()> {
        let content = match fs::read_to_string(&self.nsswitch_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let desired = "hosts:          files dns";
        let mut lines: Vec<String> = Vec::new();
        let mut replaced = false;

        for line in content.lines() {
            if line.trim_start().starts_with("hosts:") {
                if line.trim() == desired.trim() {
                    return Ok(());
                }
                lines.push(desired.to_string());
                replaced = true;
            } else {
                lines.push(line.to_string());
            }
        }
        if !replaced {
            lines.push(desired.to_string());
        }

        let mut updated = lines.join("\n");
        updated.push('\n');
        fs::write(&self.nsswitch_path, updated)?;

        info!("Name-service switch now prefers the hosts file");
        Ok(())
    }
}

/// True when `hostname` already appears as a name token on any entry line.
fn contains_hostname(content: &str, hostname: &str) -> bool {
    content.lines().any(|line| {
        let line = line.split('#').next().unwrap_or("");
        line.split_whitespace().skip(1).any(|token| token == hostname)
    })
}
