//! Observed engine state.
//!
//! The controller never caches any of this across reconciliation cycles;
//! every cycle re-reads the world through `replSetGetStatus`.

use mongodb::bson::Document;
use serde::Serialize;

use crate::error::{is_auth_message, is_not_yet_initialized, EngineError};

/// What the controller can observe about the co-located engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineState {
    /// No replica set exists yet.
    NotInitialized,
    /// A replica set exists but the current connection is not
    /// authenticated against it.
    NeedsAuth,
    /// A replica set exists and answered the status query.
    Initialized(ReplSetStatus),
}

/// Replication state of a member, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberState {
    Startup,
    Primary,
    Secondary,
    Recovering,
    Startup2,
    Unknown,
    Arbiter,
    Down,
    Rollback,
    Removed,
    /// A state code this controller does not interpret.
    Other,
}

impl MemberState {
    /// Maps the engine's numeric member-state code.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Startup,
            1 => Self::Primary,
            2 => Self::Secondary,
            3 => Self::Recovering,
            5 => Self::Startup2,
            6 => Self::Unknown,
            7 => Self::Arbiter,
            8 => Self::Down,
            9 => Self::Rollback,
            10 => Self::Removed,
            _ => Self::Other,
        }
    }
}

/// One member's row from `replSetGetStatus`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberStatus {
    /// Stable member id from the replica-set configuration.
    pub id: i32,
    /// `host:port` as configured.
    pub name: String,
    /// Replication state.
    pub state: MemberState,
    /// Engine-reported health flag.
    pub healthy: bool,
    /// True for the row describing this node.
    pub is_self: bool,
}

/// Parsed `replSetGetStatus` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplSetStatus {
    /// Replica set name.
    pub set_name: String,
    /// This node's replication state.
    pub my_state: MemberState,
    /// All members the engine knows about.
    pub members: Vec<MemberStatus>,
}

impl ReplSetStatus {
    /// Parses the status command reply.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unknown`] when mandatory fields are missing,
    /// which would mean the engine speaks a protocol this controller does
    /// not.
    pub fn from_document(doc: &Document) -> Result<Self, EngineError> {
        let set_name = doc
            .get_str("set")
            .map_err(|_| EngineError::Unknown("replSetGetStatus reply missing 'set'".into()))?
            .to_string();
        let my_state = doc
            .get_i32("myState")
            .map_err(|_| EngineError::Unknown("replSetGetStatus reply missing 'myState'".into()))
            .map(MemberState::from_code)?;

        let mut members = Vec::new();
        if let Ok(raw_members) = doc.get_array("members") {
            for raw in raw_members {
                let Some(member) = raw.as_document() else { continue };
                let (Ok(id), Ok(name)) = (member.get_i32("_id"), member.get_str("name")) else {
                    continue;
                };
                let state = member.get_i32("state").map(MemberState::from_code).unwrap_or(
                    MemberState::Other,
                );
                // Health arrives as a double for remote members and is
                // absent for self.
                let healthy = member.get_f64("health").map(|h| h > 0.0).unwrap_or(true);
                let is_self = member.get_bool("self").unwrap_or(false);
                members.push(MemberStatus {
                    id,
                    name: name.to_string(),
                    state,
                    healthy,
                    is_self,
                });
            }
        }

        Ok(Self { set_name, my_state, members })
    }

    /// Returns the `host:port` of the member currently in the primary
    /// state, if any.
    #[must_use]
    pub fn primary_host(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.state == MemberState::Primary)
            .map(|m| m.name.as_str())
    }

    /// True when this node is the primary.
    #[must_use]
    pub fn is_self_primary(&self) -> bool {
        self.my_state == MemberState::Primary
    }

    /// True when the set has a primary and this node is in a settled state.
    #[must_use]
    pub fn healthy(&self) -> bool {
        self.primary_host().is_some()
            && matches!(self.my_state, MemberState::Primary | MemberState::Secondary)
    }

    /// Members the engine currently reports as reachable.
    #[must_use]
    pub fn reachable_members(&self) -> Vec<&MemberStatus> {
        self.members.iter().filter(|m| m.healthy).collect()
    }
}

/// Maps a failed status command to an engine state, when the failure itself
/// is the answer.
///
/// `NotYetInitialized` means no set exists; `Unauthorized` or an
/// authentication-phrased message means a set exists but this connection
/// cannot see it.
#[must_use]
pub fn state_from_status_error(code: i32, message: &str) -> Option<EngineState> {
    if is_not_yet_initialized(code) {
        return Some(EngineState::NotInitialized);
    }
    if code == 13 || is_auth_message(message) {
        return Some(EngineState::NeedsAuth);
    }
    None
}
