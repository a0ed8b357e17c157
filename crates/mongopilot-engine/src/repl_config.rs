//! Replica-set configuration round-trip.
//!
//! Config documents are read from the engine, edited, and written back.
//! Fields this controller does not interpret (settings, protocol version,
//! per-member priorities an operator may have set) are carried through a
//! flattened remainder so a reconfiguration never drops them.

use std::collections::BTreeSet;

use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

use mongopilot_core::identity::strip_port;

/// One member entry of a replica-set configuration.
///
/// Member ids are stable for the lifetime of a member: the engine rejects
/// `_id` changes for existing members, so ids are never renumbered and
/// never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplMember {
    /// Stable member id.
    #[serde(rename = "_id")]
    pub id: i32,
    /// `hostname:port` of the member.
    pub host: String,
    /// Uninterpreted member fields, preserved across reconfigurations.
    #[serde(flatten)]
    pub extra: Document,
}

impl ReplMember {
    /// Creates a bare member entry.
    #[must_use]
    pub fn new(id: i32, host: impl Into<String>) -> Self {
        Self { id, host: host.into(), extra: Document::new() }
    }

    /// The hostname part of `host`, without the port.
    #[must_use]
    pub fn hostname(&self) -> &str {
        strip_port(&self.host)
    }
}

/// A full replica-set configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplSetConfig {
    /// Replica set name.
    #[serde(rename = "_id")]
    pub id: String,
    /// Configuration version; must increase on every reconfiguration.
    pub version: i32,
    /// Member list.
    pub members: Vec<ReplMember>,
    /// Uninterpreted top-level fields, preserved across reconfigurations.
    #[serde(flatten)]
    pub extra: Document,
}

impl ReplSetConfig {
    /// A fresh single-member configuration, used at initiation and by the
    /// single-member self-heal.
    #[must_use]
    pub fn single_member(set_name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: set_name.into(),
            version: 1,
            members: vec![ReplMember::new(0, host)],
            extra: Document::new(),
        }
    }

    /// Hostnames (without ports) of all configured members.
    #[must_use]
    pub fn hostnames(&self) -> BTreeSet<String> {
        self.members.iter().map(|m| m.hostname().to_string()).collect()
    }

    /// The next free member id: one past the current maximum.
    ///
    /// Ids of removed members are not reclaimed.
    #[must_use]
    pub fn next_member_id(&self) -> i32 {
        self.members.iter().map(|m| m.id).max().map_or(0, |max| max + 1)
    }

    /// Appends a member under the next free id.
    pub fn add_member(&mut self, host: impl Into<String>) {
        let id = self.next_member_id();
        self.members.push(ReplMember::new(id, host));
    }

    /// Splices out the member with the given hostname, leaving every other
    /// member's id untouched.
    pub fn remove_hostname(&mut self, hostname: &str) {
        self.members.retain(|m| m.hostname() != hostname);
    }

    /// Increments the configuration version for resubmission.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}
