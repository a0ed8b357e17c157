//! Bootstrap coordinator: the one-shot cold-start sequence.
//!
//! Ordering matters everywhere in here. A node must not initiate a replica
//! set while any peer already has one (discovery-before-init), must not
//! found a set it cannot reach through its own hostname (self-reachability),
//! and among eligible founders exactly one, the smallest address in the
//! agreed sort order, may proceed. Everyone else waits for the founder's
//! set to reach them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use mongopilot_core::identity::hostname_for;
use mongopilot_core::NodeIdentity;
use mongopilot_engine::{
    probe_remote_status, EngineControl, EngineResult, EngineState,
};

use crate::error::{ClusterError, ClusterResult};
use crate::hosts::HostsManager;
use crate::identity::IdentityResolver;
use crate::peers::PeerClient;
use crate::recovery::Recovery;
use crate::registry::RegistryClient;

/// Probes a peer's engine (not its controller) for replica-set state.
///
/// Split out as a trait so bootstrap decisions are testable without a
/// remote engine.
#[async_trait]
pub trait EngineProbe: Send + Sync {
    /// Asks the engine at `hostname` for its replica-set status.
    async fn probe(&self, hostname: &str) -> EngineResult<EngineState>;
}

/// Production probe over the engine port.
#[derive(Debug, Clone)]
pub struct RemoteEngineProbe {
    port: u16,
    credentials: Option<(String, String)>,
}

impl RemoteEngineProbe {
    /// Creates a probe for the given engine port and optional credentials.
    #[must_use]
    pub fn new(port: u16, credentials: Option<(String, String)>) -> Self {
        Self { port, credentials }
    }
}

#[async_trait]
impl EngineProbe for RemoteEngineProbe {
    async fn probe(&self, hostname: &str) -> EngineResult<EngineState> {
        let credentials =
            self.credentials.as_ref().map(|(u, p)| (u.as_str(), p.as_str()));
        probe_remote_status(hostname, self.port, credentials).await
    }
}

/// Wait/retry knobs, overridable so tests do not sleep for minutes.
#[derive(Debug, Clone)]
pub struct BootstrapTiming {
    /// Upper bound of the startup jitter applied when peers exist.
    pub jitter_max: Duration,
    /// How long a non-founder waits for the founder's set to reach it.
    pub founder_wait: Duration,
    /// Polling interval during the founder wait.
    pub founder_poll: Duration,
    /// Self-reachability attempts and the delay between them.
    pub health_attempts: u32,
    /// Delay between self-reachability attempts.
    pub health_retry_delay: Duration,
}

impl Default for BootstrapTiming {
    fn default() -> Self {
        Self {
            jitter_max: Duration::from_secs(10),
            founder_wait: Duration::from_secs(300),
            founder_poll: Duration::from_secs(10),
            health_attempts: 3,
            health_retry_delay: Duration::from_secs(2),
        }
    }
}

/// How bootstrap concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// This node initiated the replica set.
    Founded,
    /// A peer's set reached this node during the wait.
    Joined,
    /// The engine was already a member at startup.
    AlreadyMember,
}

/// The one-shot bootstrap sequence. Constructed as a literal by the
/// binary; every collaborator sits behind its seam.
pub struct Bootstrap {
    /// Local engine adapter.
    pub engine: Arc<dyn EngineControl>,
    /// Peer controller RPCs.
    pub peers: Arc<dyn PeerClient>,
    /// Peer engine probe.
    pub probe: Arc<dyn EngineProbe>,
    /// Registry client.
    pub registry: RegistryClient,
    /// Hosts-file manager.
    pub hosts: HostsManager,
    /// Identity resolver.
    pub resolver: IdentityResolver,
    /// Recovery executor, for the boot-time stale-primary and self-heal
    /// checks.
    pub recovery: Recovery,
    /// Engine listen port (member documents carry `hostname:port`).
    pub engine_port: u16,
    /// Local-testing mode: self hosts entry maps to the private address.
    pub local_testing: bool,
    /// Whether admin credentials are configured (gates root-user creation).
    pub create_root: Option<(String, String)>,
    /// Wait/retry knobs.
    pub timing: BootstrapTiming,
}

impl Bootstrap {
    /// Resolves this node's identity and writes the local name plumbing.
    ///
    /// Runs before the admin API starts so the server can advertise the
    /// real identity, and so the self-reachability probe later in
    /// [`run`](Self::run) has a live `/health` endpoint to hit.
    ///
    /// # Errors
    ///
    /// Fails when no identity source succeeds; the controller must not
    /// proceed.
    pub async fn resolve_identity(&self) -> ClusterResult<NodeIdentity> {
        self.hosts.prefer_hosts_lookup()?;
        let identity = self.resolver.resolve(&self.registry).await?;
        self.hosts.ensure_self_entry(&identity, self.local_testing)?;
        Ok(identity)
    }

    /// Runs the bootstrap sequence to completion.
    ///
    /// # Errors
    ///
    /// Fails on engine errors outside the tolerated set, or when no
    /// founder emerged within the wait budget.
    pub async fn run(&self, identity: &NodeIdentity) -> ClusterResult<BootstrapOutcome> {
        let mut members = match self.registry.fetch_members().await {
            Ok(members) => members,
            Err(err) => {
                warn!(error = %err, "Registry unavailable at bootstrap; proceeding with self only");
                Vec::new()
            }
        };
        // The desired set always includes self, whatever the registry says.
        if !members.contains(&identity.address) {
            members.push(identity.address.clone());
            members.sort();
        }
        self.hosts.ensure_peer_entries(&members, &identity.address)?;

        let peer_hostnames: Vec<String> = members
            .iter()
            .filter(|m| **m != identity.address)
            .map(|m| hostname_for(m))
            .collect();

        // Desynchronize concurrent bootstraps.
        if !peer_hostnames.is_empty() && !self.timing.jitter_max.is_zero() {
            let jitter = rand::thread_rng()
                .gen_range(Duration::ZERO..self.timing.jitter_max);
            debug!(jitter_ms = jitter.as_millis() as u64, "Applying startup jitter");
            sleep(jitter).await;
        }

        let outcome = match self.engine.status().await? {
            EngineState::NeedsAuth => {
                info!("Replica set exists; reconnecting authenticated");
                self.engine.reconnect().await?;
                BootstrapOutcome::AlreadyMember
            }
            EngineState::Initialized(status) => {
                info!(set = %status.set_name, "Engine already a replica-set member");
                self.already_member(identity, &status, &peer_hostnames).await?;
                BootstrapOutcome::AlreadyMember
            }
            EngineState::NotInitialized => {
                self.discovery_before_init(identity, &members, &peer_hostnames).await?
            }
        };

        info!(address = %identity.address, outcome = ?outcome, "Bootstrap complete");
        Ok(outcome)
    }

    /// Boot-time checks for a node that is already a member: the
    /// single-member self-heal when the set lost its primary and everyone
    /// else, otherwise one stale-primary check.
    async fn already_member(
        &self,
        identity: &NodeIdentity,
        status: &mongopilot_engine::ReplSetStatus,
        peer_hostnames: &[String],
    ) -> ClusterResult<()> {
        let others_unreachable = status
            .members
            .iter()
            .filter(|m| !m.is_self)
            .all(|m| !m.healthy);

        if status.primary_host().is_none() && status.members.len() > 1 && others_unreachable {
            warn!("Booted into a set with no primary and no reachable peers");
            self.recovery
                .single_member_self_heal(&identity.hostname, peer_hostnames)
                .await?;
            return Ok(());
        }

        if self.engine.is_primary().await {
            self.recovery.stale_primary_check(peer_hostnames).await?;
        }
        Ok(())
    }

    /// Discovery-before-init: probe every peer's engine and only proceed to
    /// the founder election when nobody has a set yet.
    async fn discovery_before_init(
        &self,
        identity: &NodeIdentity,
        members: &[String],
        peer_hostnames: &[String],
    ) -> ClusterResult<BootstrapOutcome> {
        for hostname in peer_hostnames {
            match self.probe.probe(hostname).await {
                // A peer demanding auth has a root user, which only exists
                // after a set was founded: both answers mean a set exists.
                Ok(EngineState::Initialized(_)) | Ok(EngineState::NeedsAuth) => {
                    info!(peer = %hostname, "Peer already has a replica set; waiting to be added");
                    return self.wait_for_set().await.map(|()| BootstrapOutcome::Joined);
                }
                Ok(EngineState::NotInitialized) => {
                    debug!(peer = %hostname, "Peer engine not initialized");
                }
                Err(err) => {
                    debug!(peer = %hostname, error = %err, "Peer engine probe failed");
                }
            }
        }

        self.founder_election(identity, members).await
    }

    /// The founder election: lowest address among self-reachable nodes.
    async fn founder_election(
        &self,
        identity: &NodeIdentity,
        members: &[String],
    ) -> ClusterResult<BootstrapOutcome> {
        let self_reachable = self.self_reachable(&identity.hostname).await;
        if !self_reachable {
            warn!(
                hostname = %identity.hostname,
                "Cannot reach own admin endpoint via derived hostname; ceding founder role"
            );
        }

        // `members` is sorted ascending; the front is the designated founder.
        let designated = members.first().map(String::as_str);
        if self_reachable && designated == Some(identity.address.as_str()) {
            return self.found(identity).await.map(|()| BootstrapOutcome::Founded);
        }

        info!(designated = ?designated, "Waiting for the founder to initiate the set");
        match self.wait_for_set().await {
            Ok(()) => Ok(BootstrapOutcome::Joined),
            Err(wait_err) => {
                // The designated founder never showed. Take over when this
                // node is the smallest address that is actually reachable.
                let takeover = self
                    .smallest_reachable(identity, members, self_reachable)
                    .await
                    .is_some_and(|addr| addr == identity.address);

                if takeover && self_reachable {
                    warn!("Founder wait expired; taking over as founder");
                    self.found(identity).await?;
                    return Ok(BootstrapOutcome::Founded);
                }
                Err(wait_err)
            }
        }
    }

    /// Initiates the set and creates the root user.
    async fn found(&self, identity: &NodeIdentity) -> ClusterResult<()> {
        let host = identity.engine_host(self.engine_port);
        info!(host = %host, "Founding replica set");
        self.engine.initiate(&host).await?;

        // The engine needs a moment to elect itself before it accepts the
        // user creation.
        for _ in 0..30 {
            if self.engine.is_primary().await {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }

        if let Some((username, password)) = &self.create_root {
            self.engine.create_root_user(username, password).await?;
        }
        Ok(())
    }

    /// Waits for a peer-founded set to reach this node.
    async fn wait_for_set(&self) -> ClusterResult<()> {
        let deadline = tokio::time::Instant::now() + self.timing.founder_wait;
        loop {
            match self.engine.status().await {
                Ok(EngineState::Initialized(_)) => return Ok(()),
                Ok(EngineState::NeedsAuth) => {
                    self.engine.reconnect().await?;
                    return Ok(());
                }
                Ok(EngineState::NotInitialized) => {}
                Err(err) => debug!(error = %err, "Status poll failed during founder wait"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClusterError::Bootstrap(
                    "timed out waiting for the replica set to reach this node".to_string(),
                ));
            }
            sleep(self.timing.founder_poll).await;
        }
    }

    /// Self-reachability: the node's own `/health`, via its own hostname.
    async fn self_reachable(&self, hostname: &str) -> bool {
        for attempt in 1..=self.timing.health_attempts {
            if self.peers.health(hostname).await {
                return true;
            }
            debug!(attempt = attempt, hostname = %hostname, "Self-health probe failed");
            if attempt < self.timing.health_attempts {
                sleep(self.timing.health_retry_delay).await;
            }
        }
        false
    }

    /// The smallest member address whose controller is reachable.
    async fn smallest_reachable(
        &self,
        identity: &NodeIdentity,
        members: &[String],
        self_reachable: bool,
    ) -> Option<String> {
        for address in members {
            if *address == identity.address {
                if self_reachable {
                    return Some(address.clone());
                }
                continue;
            }
            if self.peers.health(&hostname_for(address)).await {
                return Some(address.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use mongopilot_core::config::HostsConfig;
    use mongopilot_core::OplogStamp;
    use mongopilot_engine::{
        MemberState, MemberStatus, ReplMember, ReplSetConfig, ReplSetStatus,
    };

    use crate::recovery::RecoveryTiming;
    use crate::testing::{MockEngine, MockPeers, MockProbe};

    use super::*;

    const PORT: u16 = 27017;

    fn host(n: u8) -> String {
        format!("mongo-10-0-0-{n}.mongo-cluster")
    }

    fn engine_host(n: u8) -> String {
        format!("{}:{}", host(n), PORT)
    }

    fn fast_timing() -> BootstrapTiming {
        BootstrapTiming {
            jitter_max: Duration::ZERO,
            founder_wait: Duration::from_millis(50),
            founder_poll: Duration::from_millis(10),
            health_attempts: 1,
            health_retry_delay: Duration::ZERO,
        }
    }

    struct Harness {
        bootstrap: Bootstrap,
        engine: Arc<MockEngine>,
        peers: Arc<MockPeers>,
        probe: Arc<MockProbe>,
        _registry: MockServer,
        _dir: TempDir,
    }

    async fn harness(self_address: &str, registry_members: &[&str]) -> Harness {
        let registry = MockServer::start().await;
        let data: Vec<_> =
            registry_members.iter().map(|ip| serde_json::json!({ "ip": ip })).collect();
        Mock::given(method("GET"))
            .and(path("/apps/location/mongo-cluster"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": data,
            })))
            .mount(&registry)
            .await;

        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let peers = Arc::new(MockPeers::new());
        let probe = Arc::new(MockProbe::new());

        let recovery = Recovery::new(
            engine.clone() as Arc<dyn EngineControl>,
            peers.clone() as Arc<dyn PeerClient>,
            dir.path().join("data"),
        )
        .with_timing(RecoveryTiming {
            shutdown_grace: Duration::ZERO,
            status_poll_attempts: 1,
            status_poll_interval: Duration::ZERO,
        });

        let bootstrap = Bootstrap {
            engine: engine.clone(),
            peers: peers.clone(),
            probe: probe.clone(),
            registry: RegistryClient::new(registry.uri(), "mongo-cluster").unwrap(),
            hosts: HostsManager::new(&HostsConfig {
                hosts_path: dir.path().join("hosts"),
                nsswitch_path: dir.path().join("nsswitch.conf"),
            }),
            resolver: IdentityResolver::new(false, Some(self_address.to_string())).unwrap(),
            recovery,
            engine_port: PORT,
            local_testing: false,
            create_root: Some(("root".to_string(), "hunter2".to_string())),
            timing: fast_timing(),
        };

        Harness { bootstrap, engine, peers, probe, _registry: registry, _dir: dir }
    }

    #[tokio::test]
    async fn test_cold_start_smallest_address_founds() {
        // Scenario: three-node cold start; this node holds the smallest
        // address and can reach itself.
        let h = harness("10.0.0.1", &["10.0.0.2", "10.0.0.1", "10.0.0.3"]).await;
        h.probe.set(&host(2), EngineState::NotInitialized);
        h.probe.set(&host(3), EngineState::NotInitialized);
        h.peers.set_health(&host(1), true);
        h.engine.push_primary(true);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::Founded);
        assert_eq!(identity.address, "10.0.0.1");

        let calls = h.engine.calls();
        assert!(calls.contains(&format!("initiate:{}", engine_host(1))));
        assert!(calls.contains(&"create_root_user:root".to_string()));
    }

    #[tokio::test]
    async fn test_single_member_registry_founds_alone() {
        let h = harness("10.0.0.1", &["10.0.0.1"]).await;
        h.peers.set_health(&host(1), true);
        h.engine.push_primary(true);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::Founded);
        assert!(h.engine.called("initiate"));
    }

    #[tokio::test]
    async fn test_peer_with_set_suppresses_founding() {
        // Two nodes race; the other one already initiated. This node must
        // wait to be added rather than found a second set.
        let h = harness("10.0.0.1", &["10.0.0.1", "10.0.0.2"]).await;
        h.probe.set(&host(2), EngineState::NeedsAuth);
        h.peers.set_health(&host(1), true);
        // Not initialized at the branch point; the peer-led set reaches us
        // during the wait.
        h.engine.push_status(EngineState::NotInitialized);
        h.engine.push_status(EngineState::NeedsAuth);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::Joined);
        assert!(!h.engine.called("initiate"));
        assert!(h.engine.called("reconnect"));
    }

    #[tokio::test]
    async fn test_higher_address_waits_for_founder() {
        let h = harness("10.0.0.2", &["10.0.0.1", "10.0.0.2"]).await;
        h.probe.set(&host(1), EngineState::NotInitialized);
        h.peers.set_health(&host(2), true);
        // The founder's set arrives while we poll.
        h.engine.push_status(EngineState::NotInitialized);
        h.engine.push_status(EngineState::NeedsAuth);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::Joined);
        assert!(!h.engine.called("initiate"));
    }

    #[tokio::test]
    async fn test_not_self_reachable_cedes_founder_role() {
        // Smallest address but cannot route to itself: ineligible, and with
        // nobody else founding, bootstrap fails rather than risking a set
        // nobody can replicate from.
        let h = harness("10.0.0.1", &["10.0.0.1", "10.0.0.2"]).await;
        h.probe.set(&host(2), EngineState::NotInitialized);
        h.peers.set_health(&host(1), false);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let result = h.bootstrap.run(&identity).await;
        assert!(result.is_err());
        assert!(!h.engine.called("initiate"));
    }

    #[tokio::test]
    async fn test_takeover_when_designated_founder_never_appears() {
        // The designated founder (10.0.0.1) is dark; after the wait expires
        // the smallest *reachable* node takes over.
        let h = harness("10.0.0.2", &["10.0.0.1", "10.0.0.2"]).await;
        h.probe.set(&host(1), EngineState::NotInitialized);
        h.peers.set_health(&host(2), true);
        h.peers.set_health(&host(1), false);
        h.engine.push_primary(true);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::Founded);
        assert!(h.engine.called("initiate"));
    }

    #[tokio::test]
    async fn test_needs_auth_reconnects_and_finishes() {
        let h = harness("10.0.0.1", &["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_status(EngineState::NeedsAuth);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::AlreadyMember);
        assert!(h.engine.called("reconnect"));
        assert!(!h.engine.called("initiate"));
    }

    fn stranded_status() -> ReplSetStatus {
        // Three-member set: self secondary, both peers unreachable, no
        // primary anywhere.
        ReplSetStatus {
            set_name: "rs0".to_string(),
            my_state: MemberState::Secondary,
            members: vec![
                MemberStatus {
                    id: 0,
                    name: engine_host(1),
                    state: MemberState::Secondary,
                    healthy: true,
                    is_self: true,
                },
                MemberStatus {
                    id: 1,
                    name: engine_host(2),
                    state: MemberState::Down,
                    healthy: false,
                    is_self: false,
                },
                MemberStatus {
                    id: 2,
                    name: engine_host(3),
                    state: MemberState::Down,
                    healthy: false,
                    is_self: false,
                },
            ],
        }
    }

    fn stranded_config() -> ReplSetConfig {
        ReplSetConfig {
            id: "rs0".to_string(),
            version: 5,
            members: vec![
                ReplMember::new(0, engine_host(1)),
                ReplMember::new(1, engine_host(2)),
                ReplMember::new(2, engine_host(3)),
            ],
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_self_heal_aborts_when_peer_has_newer_data() {
        // Scenario: booted into an existing set, alone, no primary; once a
        // peer's oplog becomes visible it is ahead of ours.
        let h = harness("10.0.0.1", &["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        h.engine.push_status(EngineState::Initialized(stranded_status()));
        h.engine.set_config(stranded_config());
        h.engine.set_oplog(Some(OplogStamp::new(1000, 0)));
        h.peers.set_oplog(&host(2), "10.0.0.2", Some(OplogStamp::new(1500, 0)));

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::AlreadyMember);
        // The force-reconfigure must not have happened.
        assert!(!h.engine.called("reconfigure"));
    }

    #[tokio::test]
    async fn test_self_heal_forces_single_member_set() {
        let h = harness("10.0.0.1", &["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        h.engine.push_status(EngineState::Initialized(stranded_status()));
        h.engine.set_config(stranded_config());
        // Local data is at least as new as anything reachable.
        h.engine.set_oplog(Some(OplogStamp::new(2000, 0)));
        h.peers.set_oplog(&host(2), "10.0.0.2", Some(OplogStamp::new(1500, 0)));

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::AlreadyMember);

        let calls = h.engine.calls();
        let reconfigure = calls.iter().find(|c| c.starts_with("reconfigure")).unwrap();
        assert!(reconfigure.contains("force=true"));
        assert!(reconfigure.contains(&engine_host(1)));
        assert!(!reconfigure.contains(&engine_host(2)));
    }

    #[tokio::test]
    async fn test_already_member_primary_runs_stale_check() {
        let mut status = stranded_status();
        status.my_state = MemberState::Primary;
        status.members[0].state = MemberState::Primary;
        status.members[1].healthy = true;
        status.members[1].state = MemberState::Secondary;

        let h = harness("10.0.0.1", &["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_status(EngineState::Initialized(status));
        h.engine.push_primary(true);
        h.engine.set_oplog(Some(OplogStamp::new(1000, 0)));
        h.peers.set_oplog(&host(2), "10.0.0.2", Some(OplogStamp::new(1700, 0)));

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        let outcome = h.bootstrap.run(&identity).await.unwrap();
        assert_eq!(outcome, BootstrapOutcome::AlreadyMember);
        assert!(h.engine.calls().contains(&"step_down:300".to_string()));
    }

    #[tokio::test]
    async fn test_bootstrap_writes_hosts_entries() {
        let h = harness("10.0.0.1", &["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_status(EngineState::NeedsAuth);

        let identity = h.bootstrap.resolve_identity().await.unwrap();
        h.bootstrap.run(&identity).await.unwrap();

        let content =
            std::fs::read_to_string(h._dir.path().join("hosts")).unwrap();
        assert!(content.contains(&format!("127.0.0.1 {}", host(1))));
        assert!(content.contains(&format!("10.0.0.2 {}", host(2))));
    }
}
