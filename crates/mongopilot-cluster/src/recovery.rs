//! Recovery actions: split-brain convergence, stale-primary step-down and
//! the nuclear resync.
//!
//! The controller favors availability over aggressive self-healing. The
//! only destructive action it knows, wiping the local data directory, is
//! taken exclusively on positive evidence that a peer holds strictly newer
//! data. When the evidence is missing or ambiguous, recovery waits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::sleep;
use tracing::{info, warn};

use mongopilot_core::OplogStamp;
use mongopilot_engine::{EngineControl, EngineState};

use crate::error::{ClusterError, ClusterResult};
use crate::peers::PeerClient;

/// Step-down duration after a split-brain verdict.
const SPLIT_BRAIN_STEP_DOWN_SECS: u32 = 60;

/// Step-down duration for a stale primary. Long enough for the legitimate
/// primary to consolidate before this node can stand again.
const STALE_PRIMARY_STEP_DOWN_SECS: u32 = 300;

/// Wait knobs for recovery, overridable in tests.
#[derive(Debug, Clone)]
pub struct RecoveryTiming {
    /// Grace period between asking the engine to terminate and wiping its
    /// data directory.
    pub shutdown_grace: Duration,
    /// Post-step-down status polling attempts.
    pub status_poll_attempts: u32,
    /// Spacing between status polls.
    pub status_poll_interval: Duration,
}

impl Default for RecoveryTiming {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(5),
            status_poll_attempts: 5,
            status_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Executes the recovery state machine against the engine and peer seams.
pub struct Recovery {
    engine: Arc<dyn EngineControl>,
    peers: Arc<dyn PeerClient>,
    data_dir: PathBuf,
    timing: RecoveryTiming,
}

impl Recovery {
    /// Creates the recovery executor.
    #[must_use]
    pub fn new(
        engine: Arc<dyn EngineControl>,
        peers: Arc<dyn PeerClient>,
        data_dir: PathBuf,
    ) -> Self {
        Self { engine, peers, data_dir, timing: RecoveryTiming::default() }
    }

    /// Overrides the wait knobs. For tests.
    #[must_use]
    pub fn with_timing(mut self, timing: RecoveryTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Stale-primary self-check.
    ///
    /// A primary whose oplog trails any peer's returned from a partition
    /// after the cluster moved on; writing through it would clobber the new
    /// primary's history. Steps down for five minutes and reports whether
    /// it did. Runs every cycle while primary; it is the compensating
    /// mechanism for consensus treating unreachable peers as abstentions.
    ///
    /// # Errors
    ///
    /// Returns an error if the step-down itself fails.
    pub async fn stale_primary_check(&self, peer_hostnames: &[String]) -> ClusterResult<bool> {
        let Ok(Some(local)) = self.engine.latest_oplog().await else {
            // Without a local position there is nothing to compare against.
            return Ok(false);
        };

        let Some((peer, newest)) = self.newest_peer_oplog(peer_hostnames).await else {
            return Ok(false);
        };

        if newest > local {
            warn!(
                peer = %peer,
                peer_oplog = %newest,
                local_oplog = %local,
                "Peer holds newer oplog while this node is primary; stepping down"
            );
            counter!("mongopilot_step_downs", "reason" => "stale_primary").increment(1);
            self.engine.step_down(STALE_PRIMARY_STEP_DOWN_SECS).await?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Split-brain recovery, phase one: relinquish primacy and see whether
    /// the engine re-joins the legitimate set on its own. Phase two is the
    /// nuclear resync.
    ///
    /// # Errors
    ///
    /// Propagates [`ClusterError::ResyncRestart`] when phase two wiped the
    /// data directory and the controller must exit.
    pub async fn split_brain(&self, peer_hostnames: &[String]) -> ClusterResult<()> {
        warn!("Split-brain detected; stepping down and reconnecting");
        counter!("mongopilot_step_downs", "reason" => "split_brain").increment(1);

        self.engine.step_down(SPLIT_BRAIN_STEP_DOWN_SECS).await?;

        for _ in 0..self.timing.status_poll_attempts {
            sleep(self.timing.status_poll_interval).await;
            if self.engine.reconnect().await.is_err() {
                continue;
            }
            if let Ok(EngineState::Initialized(status)) = self.engine.status().await {
                if status.healthy() {
                    info!("Rejoined replica set after step-down");
                    return Ok(());
                }
            }
        }

        warn!("Step-down did not converge; escalating to nuclear resync");
        self.nuclear_resync(peer_hostnames).await
    }

    /// Nuclear resync: wipe local data and exit so the supervisor restarts
    /// the container into a fresh bootstrap and a full sync from a peer.
    ///
    /// The safety gate aborts unless at least one peer demonstrably holds
    /// an oplog timestamp strictly greater than this node's. In particular
    /// the node holding the newest data in the cluster never wipes.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::ResyncRestart`] after a completed wipe. Any
    /// other outcome is a clean abort.
    pub async fn nuclear_resync(&self, peer_hostnames: &[String]) -> ClusterResult<()> {
        let local = self.engine.latest_oplog().await.ok().flatten();

        let Some((peer, newest)) = self.newest_peer_oplog(peer_hostnames).await else {
            info!("No peer oplog evidence; refusing to wipe local data");
            return Ok(());
        };

        if let Some(local) = local {
            if local >= newest {
                info!(
                    local_oplog = %local,
                    peer_oplog = %newest,
                    "This node holds the newest data; waiting for peers to realign"
                );
                return Ok(());
            }
        }

        warn!(
            peer = %peer,
            peer_oplog = %newest,
            local_oplog = ?local,
            "Peer holds strictly newer data; wiping local data for full resync"
        );
        counter!("mongopilot_resync_wipes").increment(1);

        if let Err(err) = self.engine.shutdown_engine().await {
            warn!(error = %err, "Engine shutdown request failed; proceeding with wipe");
        }
        sleep(self.timing.shutdown_grace).await;

        self.wipe_data_dir().await?;

        Err(ClusterError::ResyncRestart(format!(
            "data wiped, peer {peer} holds newer oplog {newest}"
        )))
    }

    /// Single-member self-heal: this node booted into an existing set with
    /// no reachable peers and no primary. Force-reconfigures down to a
    /// single-member set, but only after the oplog safety gate confirms no
    /// peer has newer data.
    ///
    /// Returns whether a reconfiguration was submitted.
    ///
    /// # Errors
    ///
    /// Returns an error when reading or submitting the configuration fails.
    pub async fn single_member_self_heal(
        &self,
        self_hostname: &str,
        peer_hostnames: &[String],
    ) -> ClusterResult<bool> {
        let local = self.engine.latest_oplog().await.ok().flatten();

        if let Some((peer, newest)) = self.newest_peer_oplog(peer_hostnames).await {
            if local.is_none() || local.is_some_and(|l| newest > l) {
                info!(
                    peer = %peer,
                    peer_oplog = %newest,
                    "Peer has newer data; waiting for re-admission instead of self-healing"
                );
                return Ok(false);
            }
        }

        let mut config = self.engine.get_config().await?;
        config.members.retain(|m| m.hostname() == self_hostname);
        if config.members.is_empty() {
            warn!(hostname = self_hostname, "Own member entry missing; cannot self-heal");
            return Ok(false);
        }
        config.bump_version();

        warn!(version = config.version, "Force-reconfiguring to a single-member set");
        self.engine.reconfigure(&config, true).await?;
        Ok(true)
    }

    /// The greatest oplog timestamp any responsive peer reports.
    async fn newest_peer_oplog(
        &self,
        peer_hostnames: &[String],
    ) -> Option<(String, OplogStamp)> {
        let mut newest: Option<(String, OplogStamp)> = None;
        for hostname in peer_hostnames {
            let Some(reply) = self.peers.oplog(hostname).await else { continue };
            let Some(stamp) = reply.timestamp else { continue };
            if newest.as_ref().is_none_or(|(_, best)| stamp > *best) {
                newest = Some((hostname.clone(), stamp));
            }
        }
        newest
    }

    async fn wipe_data_dir(&self) -> ClusterResult<()> {
        match tokio::fs::remove_dir_all(&self.data_dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(mongopilot_core::Error::Io(err).into()),
        }
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(mongopilot_core::Error::Io)?;
        info!(path = %self.data_dir.display(), "Data directory wiped");
        Ok(())
    }
}
