//! The steady-state reconciliation loop.
//!
//! Every cycle reads the world from scratch: the registry's desired
//! membership, the engine's primacy and current configuration, and the
//! peers' opinions. Nothing is carried across cycles, so an abandoned
//! cycle costs nothing.
//!
//! The engine alone decides who is primary. This loop only ever mutates
//! replica-set configuration while the engine reports this node primary,
//! and re-verifies that immediately before submitting a reconfiguration.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use mongopilot_core::identity::hostname_for;
use mongopilot_core::NodeIdentity;
use mongopilot_engine::{EngineControl, EngineError};

use crate::error::{ClusterError, ClusterResult};
use crate::hosts::HostsManager;
use crate::peers::PeerClient;
use crate::recovery::Recovery;
use crate::registry::RegistryClient;

/// What a reconciliation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The registry was unreachable; the cycle kept the last known state.
    RegistryUnavailable,
    /// This node is not primary; nothing to reconcile.
    NotPrimary,
    /// The stale-primary check fired and this node stepped down.
    SteppedDown,
    /// A peer majority named a different primary; recovery ran.
    SplitBrain,
    /// Desired and current membership already agree.
    InSync,
    /// A reconfiguration was submitted.
    Reconfigured {
        /// Members added this cycle.
        added: usize,
        /// Members removed this cycle.
        removed: usize,
    },
}

/// The steady-state reconciler. Constructed as a literal by the binary.
pub struct Reconciler {
    /// Local engine adapter.
    pub engine: Arc<dyn EngineControl>,
    /// Peer controller RPCs.
    pub peers: Arc<dyn PeerClient>,
    /// Registry client.
    pub registry: RegistryClient,
    /// Hosts-file manager.
    pub hosts: HostsManager,
    /// Recovery executor.
    pub recovery: Recovery,
    /// This node's identity, fixed at bootstrap.
    pub identity: NodeIdentity,
    /// Engine listen port.
    pub engine_port: u16,
    /// Cycle interval.
    pub interval: Duration,
}

impl Reconciler {
    /// Runs reconciliation forever.
    ///
    /// # Errors
    ///
    /// Returns only when recovery demands a controller restart
    /// ([`ClusterError::ResyncRestart`]); every other cycle error is logged
    /// and retried on the next tick.
    pub async fn run(&self) -> ClusterResult<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(outcome) => debug!(outcome = ?outcome, "Reconciliation cycle finished"),
                Err(ClusterError::ResyncRestart(reason)) => {
                    return Err(ClusterError::ResyncRestart(reason));
                }
                Err(err) => warn!(error = %err, "Reconciliation cycle failed"),
            }
        }
    }

    /// Runs one reconciliation cycle.
    ///
    /// # Errors
    ///
    /// Returns an error on engine failures the cycle has no policy for and
    /// on [`ClusterError::ResyncRestart`].
    pub async fn run_cycle(&self) -> ClusterResult<CycleOutcome> {
        counter!("mongopilot_reconcile_cycles").increment(1);

        let mut members = match self.registry.fetch_members().await {
            Ok(members) => members,
            Err(err) => {
                warn!(error = %err, "Registry unreachable; keeping last known state");
                counter!("mongopilot_registry_failures").increment(1);
                return Ok(CycleOutcome::RegistryUnavailable);
            }
        };
        // The desired set always includes self.
        if !members.contains(&self.identity.address) {
            members.push(self.identity.address.clone());
            members.sort();
        }
        gauge!("mongopilot_registry_members").set(members.len() as f64);

        self.hosts.ensure_peer_entries(&members, &self.identity.address)?;

        // The engine alone decides primacy; a secondary has nothing to do.
        if !self.engine.is_primary().await {
            return Ok(CycleOutcome::NotPrimary);
        }

        let peer_hostnames: Vec<String> = members
            .iter()
            .filter(|m| **m != self.identity.address)
            .map(|m| hostname_for(m))
            .collect();

        // Consensus check: does a majority of the cluster agree that
        // somebody else is primary while we believe it is us?
        if members.len() > 1 {
            if let Some(other) = self.split_brain_verdict(members.len(), &peer_hostnames).await
            {
                warn!(
                    claimed_primary = %other,
                    "Peer majority names a different primary; entering split-brain recovery"
                );
                counter!("mongopilot_split_brain_detected").increment(1);
                self.recovery.split_brain(&peer_hostnames).await?;
                return Ok(CycleOutcome::SplitBrain);
            }
        }

        // Stale-primary self-check, every cycle while primary: consensus
        // treats unreachable peers as abstentions, so a partitioned old
        // primary needs this second line of defense.
        if self.recovery.stale_primary_check(&peer_hostnames).await? {
            return Ok(CycleOutcome::SteppedDown);
        }

        let config = self.engine.get_config().await?;
        let desired: BTreeSet<String> = members.iter().map(|m| hostname_for(m)).collect();
        let current = config.hostnames();
        let (to_add, to_remove) = membership_delta(&desired, &current, &self.identity.hostname);

        if to_add.is_empty() && to_remove.is_empty() {
            return Ok(CycleOutcome::InSync);
        }

        // Primacy can be lost at any suspension point above; re-verify
        // immediately before mutating.
        if !self.engine.is_primary().await {
            debug!("Lost primacy mid-cycle; abandoning reconfiguration");
            return Ok(CycleOutcome::NotPrimary);
        }

        let mut next = config;
        for hostname in &to_add {
            next.add_member(format!("{}:{}", hostname, self.engine_port));
        }
        for hostname in &to_remove {
            next.remove_hostname(hostname);
        }
        next.bump_version();

        info!(
            added = ?to_add,
            removed = ?to_remove,
            version = next.version,
            "Submitting membership reconfiguration"
        );

        match self.engine.reconfigure(&next, false).await {
            Ok(()) => {
                counter!("mongopilot_reconfigurations").increment(1);
                Ok(CycleOutcome::Reconfigured { added: to_add.len(), removed: to_remove.len() })
            }
            Err(EngineError::ReplicaSetMismatch(msg)) => {
                // This node and a peer were initialized independently; only
                // a wipe reconciles them, and only when it is safe.
                warn!(message = %msg, "Replica-set identity mismatch; escalating to resync");
                self.recovery.nuclear_resync(&peer_hostnames).await?;
                Err(EngineError::ReplicaSetMismatch(msg).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Tallies peer `/primary` opinions. Returns the `host:port` a majority
    /// names, when that host is not this node. Unreachable peers abstain.
    async fn split_brain_verdict(
        &self,
        cluster_size: usize,
        peer_hostnames: &[String],
    ) -> Option<String> {
        let threshold = majority_threshold(cluster_size);
        let self_host = self.identity.engine_host(self.engine_port);

        let mut tally: HashMap<String, usize> = HashMap::new();
        for hostname in peer_hostnames {
            let Some(opinion) = self.peers.primary(hostname).await else { continue };
            if let Some(primary) = opinion.primary {
                *tally.entry(primary).or_insert(0) += 1;
            }
        }

        tally
            .into_iter()
            .filter(|(host, _)| *host != self_host)
            .find(|(_, votes)| *votes >= threshold)
            .map(|(host, _)| host)
    }
}

/// Majority threshold for a cluster of `n` known nodes.
#[must_use]
pub fn majority_threshold(n: usize) -> usize {
    n / 2 + 1
}

/// Computes the membership diff for one cycle.
///
/// Self is never a removal candidate: a primary cannot splice itself out,
/// and the registry dropping this node is handled by the peers' cycles.
fn membership_delta(
    desired: &BTreeSet<String>,
    current: &BTreeSet<String>,
    self_hostname: &str,
) -> (Vec<String>, Vec<String>) {
    let to_add: Vec<String> = desired.difference(current).cloned().collect();
    let to_remove: Vec<String> = current
        .difference(desired)
        .filter(|h| h.as_str() != self_hostname)
        .cloned()
        .collect();
    (to_add, to_remove)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use mongopilot_core::config::HostsConfig;
    use mongopilot_core::OplogStamp;
    use mongopilot_engine::{
        EngineState, MemberState, MemberStatus, ReplMember, ReplSetConfig, ReplSetStatus,
    };

    use crate::recovery::RecoveryTiming;
    use crate::testing::{MockEngine, MockPeers};

    use super::*;

    const PORT: u16 = 27017;

    fn host(n: u8) -> String {
        format!("mongo-10-0-0-{n}.mongo-cluster")
    }

    fn engine_host(n: u8) -> String {
        format!("{}:{}", host(n), PORT)
    }

    fn three_member_config() -> ReplSetConfig {
        ReplSetConfig {
            id: "rs0".to_string(),
            version: 3,
            members: vec![
                ReplMember::new(0, engine_host(1)),
                ReplMember::new(1, engine_host(2)),
                ReplMember::new(2, engine_host(3)),
            ],
            extra: Default::default(),
        }
    }

    struct Harness {
        reconciler: Reconciler,
        engine: Arc<MockEngine>,
        peers: Arc<MockPeers>,
        _registry: MockServer,
        _dir: TempDir,
    }

    async fn harness(registry_members: &[&str]) -> Harness {
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
        let hosts = HostsManager::new(&HostsConfig {
            hosts_path: dir.path().join("hosts"),
            nsswitch_path: dir.path().join("nsswitch.conf"),
        });

        let engine = Arc::new(MockEngine::new());
        let peers = Arc::new(MockPeers::new());
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

        let reconciler = Reconciler {
            engine: engine.clone(),
            peers: peers.clone(),
            registry: RegistryClient::new(registry.uri(), "mongo-cluster").unwrap(),
            hosts,
            recovery,
            identity: NodeIdentity::new("10.0.0.1"),
            engine_port: PORT,
            interval: Duration::from_secs(30),
        };

        Harness { reconciler, engine, peers, _registry: registry, _dir: dir }
    }

    #[tokio::test]
    async fn test_not_primary_skips_cycle() {
        let h = harness(&["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_primary(false);

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::NotPrimary);
        assert!(h.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_in_sync_issues_no_mutations() {
        let h = harness(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(three_member_config());

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::InSync);
        assert!(!h.engine.called("reconfigure"));
        assert!(!h.engine.called("step_down"));
    }

    #[tokio::test]
    async fn test_late_joiner_gets_next_id() {
        // Scenario: a fourth node appears in the registry while this node
        // is primary.
        let h = harness(&["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(three_member_config());

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Reconfigured { added: 1, removed: 0 });

        let calls = h.engine.calls();
        let reconfigure = calls.iter().find(|c| c.starts_with("reconfigure")).unwrap();
        // Version bumped from 3, new member appended under id 3 with the
        // existing members untouched.
        assert!(reconfigure.contains("v4"));
        assert!(reconfigure.contains(&engine_host(4)));

        let config = h.engine.get_config().await.unwrap();
        let ids: Vec<i32> = config.members.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_departed_member_removed_without_renumbering() {
        let h = harness(&["10.0.0.1", "10.0.0.3"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(three_member_config());

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Reconfigured { added: 0, removed: 1 });

        let config = h.engine.get_config().await.unwrap();
        let ids: Vec<i32> = config.members.iter().map(|m| m.id).collect();
        // Member 1 (10.0.0.2) spliced out; survivors keep their ids.
        assert_eq!(ids, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_primacy_reverified_before_reconfigure() {
        let h = harness(&["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]).await;
        // Primary at the gate, lost by the time of the re-check.
        h.engine.push_primary(true);
        h.engine.push_primary(false);
        h.engine.set_config(three_member_config());

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::NotPrimary);
        assert!(!h.engine.called("reconfigure"));
    }

    #[tokio::test]
    async fn test_split_brain_detected_and_recovered() {
        // Scenario: this node is isolated and still believes itself
        // primary; the other two name 10.0.0.2.
        let h = harness(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        h.engine.push_primary(true);
        h.peers.set_primary(&host(2), Some(&engine_host(2)), true);
        h.peers.set_primary(&host(3), Some(&engine_host(2)), false);
        // After the step-down the engine rejoins a healthy set.
        h.engine.push_status(EngineState::Initialized(rejoined_status()));

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::SplitBrain);
        assert!(h.engine.calls().contains(&"step_down:60".to_string()));
        assert!(!h.engine.called("shutdown"));
    }

    fn rejoined_status() -> ReplSetStatus {
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
                    state: MemberState::Primary,
                    healthy: true,
                    is_self: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_minority_opinion_is_not_split_brain() {
        let h = harness(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(three_member_config());
        // Only one of three nodes names someone else: below threshold 2.
        h.peers.set_primary(&host(2), Some(&engine_host(2)), true);

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::InSync);
        assert!(!h.engine.called("step_down"));
    }

    #[tokio::test]
    async fn test_unreachable_peers_abstain_from_consensus() {
        let h = harness(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(three_member_config());
        // No peer opinions scripted at all: everybody abstains, no verdict.

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::InSync);
    }

    #[tokio::test]
    async fn test_stale_primary_steps_down() {
        // Scenario: a peer's oplog is ahead while this node is primary.
        let h = harness(&["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_primary(true);
        h.engine.set_oplog(Some(OplogStamp::new(1000, 1)));
        h.peers.set_oplog(&host(2), "10.0.0.2", Some(OplogStamp::new(1060, 1)));

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::SteppedDown);
        assert!(h.engine.calls().contains(&"step_down:300".to_string()));
    }

    #[tokio::test]
    async fn test_equal_oplog_is_not_stale() {
        let h = harness(&["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(ReplSetConfig {
            id: "rs0".to_string(),
            version: 1,
            members: vec![
                ReplMember::new(0, engine_host(1)),
                ReplMember::new(1, engine_host(2)),
            ],
            extra: Default::default(),
        });
        h.engine.set_oplog(Some(OplogStamp::new(1000, 5)));
        h.peers.set_oplog(&host(2), "10.0.0.2", Some(OplogStamp::new(1000, 5)));

        let outcome = h.reconciler.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::InSync);
        assert!(!h.engine.called("step_down"));
    }

    #[tokio::test]
    async fn test_replica_set_mismatch_escalates_to_resync() {
        let h = harness(&["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(ReplSetConfig {
            id: "rs0".to_string(),
            version: 1,
            members: vec![ReplMember::new(0, engine_host(1))],
            extra: Default::default(),
        });
        h.engine.set_oplog(Some(OplogStamp::new(1000, 0)));
        h.engine.fail_next_reconfigure(EngineError::ReplicaSetMismatch(
            "replica set ID did not match".to_string(),
        ));
        // The peer holds newer data: the wipe is safe and must fire.
        h.peers.set_oplog(&host(2), "10.0.0.2", Some(OplogStamp::new(2000, 0)));

        let result = h.reconciler.run_cycle().await;
        assert!(matches!(result, Err(ClusterError::ResyncRestart(_))));
        assert!(h.engine.called("shutdown"));
    }

    #[tokio::test]
    async fn test_resync_aborts_when_self_holds_newest_data() {
        // Invariant: no wipe while the local oplog is the maximum.
        let h = harness(&["10.0.0.1", "10.0.0.2"]).await;
        h.engine.push_primary(true);
        h.engine.set_config(ReplSetConfig {
            id: "rs0".to_string(),
            version: 1,
            members: vec![ReplMember::new(0, engine_host(1))],
            extra: Default::default(),
        });
        h.engine.set_oplog(Some(OplogStamp::new(3000, 0)));
        h.engine.fail_next_reconfigure(EngineError::ReplicaSetMismatch(
            "replica set ID did not match".to_string(),
        ));
        h.peers.set_oplog(&host(2), "10.0.0.2", Some(OplogStamp::new(2000, 0)));

        let result = h.reconciler.run_cycle().await;
        // The mismatch is surfaced for the log, but nothing was wiped.
        assert!(matches!(result, Err(ClusterError::Engine(_))));
        assert!(!h.engine.called("shutdown"));
    }

    #[tokio::test]
    async fn test_registry_outage_keeps_state() {
        // Scenario: registry down for an extended period; zero mutations.
        let registry = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&registry)
            .await;

        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let peers = Arc::new(MockPeers::new());
        let recovery = Recovery::new(
            engine.clone() as Arc<dyn EngineControl>,
            peers.clone() as Arc<dyn PeerClient>,
            dir.path().join("data"),
        );
        let reconciler = Reconciler {
            engine: engine.clone(),
            peers,
            registry: RegistryClient::new(registry.uri(), "mongo-cluster").unwrap(),
            hosts: HostsManager::new(&HostsConfig {
                hosts_path: dir.path().join("hosts"),
                nsswitch_path: dir.path().join("nsswitch.conf"),
            }),
            recovery,
            identity: NodeIdentity::new("10.0.0.1"),
            engine_port: PORT,
            interval: Duration::from_secs(30),
        };
        engine.push_primary(true);

        for _ in 0..3 {
            let outcome = reconciler.run_cycle().await.unwrap();
            assert_eq!(outcome, CycleOutcome::RegistryUnavailable);
        }
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_majority_threshold() {
        assert_eq!(majority_threshold(1), 1);
        assert_eq!(majority_threshold(2), 2);
        assert_eq!(majority_threshold(3), 2);
        assert_eq!(majority_threshold(4), 3);
        assert_eq!(majority_threshold(5), 3);
    }

    #[test]
    fn test_membership_delta_protects_self() {
        let desired: BTreeSet<String> = [host(2)].into_iter().collect();
        let current: BTreeSet<String> = [host(1), host(2), host(3)].into_iter().collect();

        let (to_add, to_remove) = membership_delta(&desired, &current, &host(1));
        assert!(to_add.is_empty());
        // Self (host 1) is not removable even though the registry dropped it.
        assert_eq!(to_remove, vec![host(3)]);
    }
}
