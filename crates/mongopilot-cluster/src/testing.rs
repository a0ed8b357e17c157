//! Test doubles for the engine and peer seams.
//!
//! The bootstrap coordinator and the reconciler take their collaborators
//! as trait objects; these fakes script their answers so the decision
//! logic can be exercised without an engine process or a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use mongopilot_core::OplogStamp;
use mongopilot_engine::{
    EngineControl, EngineError, EngineResult, EngineState, MemberState, MemberStatus,
    ReplSetConfig, ReplSetStatus,
};

use crate::bootstrap::EngineProbe;
use crate::peers::{PeerClient, PeerOplog, PeerPrimary};

/// A scripted [`EngineControl`]: answers come from queues (the last queued
/// answer repeats) and every mutating call is recorded.
#[derive(Default)]
pub struct MockEngine {
    states: Mutex<VecDeque<EngineState>>,
    primary: Mutex<VecDeque<bool>>,
    oplog: Mutex<Option<OplogStamp>>,
    config: Mutex<Option<ReplSetConfig>>,
    fail_reconfigure: Mutex<Option<EngineError>>,
    calls: Mutex<Vec<String>>,
}

impl MockEngine {
    /// Creates an engine that reports `NotInitialized` and not-primary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a status answer. The last queued answer repeats forever.
    pub fn push_status(&self, state: EngineState) {
        self.states.lock().unwrap().push_back(state);
    }

    /// Queues an `is_primary` answer. The last queued answer repeats.
    pub fn push_primary(&self, primary: bool) {
        self.primary.lock().unwrap().push_back(primary);
    }

    /// Sets the local oplog position.
    pub fn set_oplog(&self, stamp: Option<OplogStamp>) {
        *self.oplog.lock().unwrap() = stamp;
    }

    /// Sets the configuration returned by `get_config`.
    pub fn set_config(&self, config: ReplSetConfig) {
        *self.config.lock().unwrap() = Some(config);
    }

    /// Makes the next `reconfigure` call fail with the given error.
    pub fn fail_next_reconfigure(&self, err: EngineError) {
        *self.fail_reconfigure.lock().unwrap() = Some(err);
    }

    /// Every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// True when any recorded call starts with `prefix`.
    #[must_use]
    pub fn called(&self, prefix: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn pop_or_repeat<T: Clone>(queue: &Mutex<VecDeque<T>>, default: T) -> T {
        let mut queue = queue.lock().unwrap();
        match queue.len() {
            0 => default,
            1 => queue.front().cloned().unwrap_or(default),
            _ => queue.pop_front().unwrap_or(default),
        }
    }
}

#[async_trait]
impl EngineControl for MockEngine {
    async fn status(&self) -> EngineResult<EngineState> {
        Ok(Self::pop_or_repeat(&self.states, EngineState::NotInitialized))
    }

    async fn is_primary(&self) -> bool {
        Self::pop_or_repeat(&self.primary, false)
    }

    async fn initiate(&self, host: &str) -> EngineResult<()> {
        self.record(format!("initiate:{host}"));
        Ok(())
    }

    async fn get_config(&self) -> EngineResult<ReplSetConfig> {
        self.config
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| EngineError::Unknown("no config scripted".to_string()))
    }

    async fn reconfigure(&self, config: &ReplSetConfig, force: bool) -> EngineResult<()> {
        if let Some(err) = self.fail_reconfigure.lock().unwrap().take() {
            self.record(format!("reconfigure_failed:v{}", config.version));
            return Err(err);
        }
        let hosts: Vec<String> = config.members.iter().map(|m| m.host.clone()).collect();
        self.record(format!(
            "reconfigure:v{}:force={}:members={}",
            config.version,
            force,
            hosts.join(",")
        ));
        *self.config.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn create_root_user(&self, username: &str, _password: &str) -> EngineResult<()> {
        self.record(format!("create_root_user:{username}"));
        Ok(())
    }

    async fn step_down(&self, secs: u32) -> EngineResult<()> {
        self.record(format!("step_down:{secs}"));
        Ok(())
    }

    async fn latest_oplog(&self) -> EngineResult<Option<OplogStamp>> {
        Ok(*self.oplog.lock().unwrap())
    }

    async fn reconnect(&self) -> EngineResult<()> {
        self.record("reconnect".to_string());
        Ok(())
    }

    async fn shutdown_engine(&self) -> EngineResult<()> {
        self.record("shutdown".to_string());
        Ok(())
    }
}

/// A status snapshot for a node that rejoined a healthy set as a
/// secondary.
#[must_use]
pub fn rejoined_secondary_status() -> ReplSetStatus {
    ReplSetStatus {
        set_name: "rs0".to_string(),
        my_state: MemberState::Secondary,
        members: vec![
            MemberStatus {
                id: 0,
                name: "mongo-10-0-0-1.mongo-cluster:27017".to_string(),
                state: MemberState::Secondary,
                healthy: true,
                is_self: true,
            },
            MemberStatus {
                id: 1,
                name: "mongo-10-0-0-2.mongo-cluster:27017".to_string(),
                state: MemberState::Primary,
                healthy: true,
                is_self: false,
            },
        ],
    }
}

/// A scripted [`PeerClient`]. Unscripted hostnames abstain.
#[derive(Default)]
pub struct MockPeers {
    health: Mutex<HashMap<String, bool>>,
    primaries: Mutex<HashMap<String, PeerPrimary>>,
    oplogs: Mutex<HashMap<String, PeerOplog>>,
}

impl MockPeers {
    /// Creates a peer client where every peer abstains.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a health answer.
    pub fn set_health(&self, hostname: &str, healthy: bool) {
        self.health.lock().unwrap().insert(hostname.to_string(), healthy);
    }

    /// Scripts a primary opinion.
    pub fn set_primary(&self, hostname: &str, primary: Option<&str>, is_primary: bool) {
        self.primaries.lock().unwrap().insert(
            hostname.to_string(),
            PeerPrimary { primary: primary.map(str::to_string), is_primary },
        );
    }

    /// Scripts an oplog position.
    pub fn set_oplog(&self, hostname: &str, ip: &str, timestamp: Option<OplogStamp>) {
        self.oplogs.lock().unwrap().insert(
            hostname.to_string(),
            PeerOplog { hostname: hostname.to_string(), ip: ip.to_string(), timestamp },
        );
    }
}

#[async_trait]
impl PeerClient for MockPeers {
    async fn health(&self, hostname: &str) -> bool {
        self.health.lock().unwrap().get(hostname).copied().unwrap_or(false)
    }

    async fn primary(&self, hostname: &str) -> Option<PeerPrimary> {
        self.primaries.lock().unwrap().get(hostname).cloned()
    }

    async fn oplog(&self, hostname: &str) -> Option<PeerOplog> {
        self.oplogs.lock().unwrap().get(hostname).cloned()
    }
}

/// A scripted [`EngineProbe`]. Unscripted hostnames are unreachable.
#[derive(Default)]
pub struct MockProbe {
    results: Mutex<HashMap<String, EngineState>>,
}

impl MockProbe {
    /// Creates a probe where every peer engine is unreachable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a probe answer.
    pub fn set(&self, hostname: &str, state: EngineState) {
        self.results.lock().unwrap().insert(hostname.to_string(), state);
    }
}

#[async_trait]
impl EngineProbe for MockProbe {
    async fn probe(&self, hostname: &str) -> EngineResult<EngineState> {
        self.results
            .lock()
            .unwrap()
            .get(hostname)
            .cloned()
            .ok_or_else(|| EngineError::Unreachable(format!("{hostname} not scripted")))
    }
}
