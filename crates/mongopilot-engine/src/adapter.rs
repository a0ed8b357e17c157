//! The engine adapter: a narrow, typed surface over admin commands.
//!
//! [`MongoEngine`] owns the driver connection. Callers treat the connection
//! as opaque; reconnection (including the authenticated/unauthenticated
//! fallback dance around the localhost exception) is handled in here.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, from_document, to_document, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::Client;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use mongopilot_core::config::EngineConfig;
use mongopilot_core::OplogStamp;

use crate::error::{EngineError, EngineResult};
use crate::repl_config::ReplSetConfig;
use crate::state::{state_from_status_error, EngineState, ReplSetStatus};

/// Timeout for establishing a connection to an engine.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for server selection on an established client.
const SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Admin commands the controller issues against the co-located engine.
///
/// The trait exists so the bootstrap coordinator and the reconciler can be
/// exercised against an in-process fake; [`MongoEngine`] is the only real
/// implementation.
#[async_trait]
pub trait EngineControl: Send + Sync {
    /// Observes the engine's replica-set state.
    async fn status(&self) -> EngineResult<EngineState>;

    /// True only when the engine reports itself the writable primary.
    ///
    /// On a connection error this attempts a single reconnect before
    /// answering false.
    async fn is_primary(&self) -> bool;

    /// Initializes the replica set with a single-member configuration.
    /// Idempotent when the set already exists.
    async fn initiate(&self, host: &str) -> EngineResult<()>;

    /// Reads the full replica-set configuration.
    async fn get_config(&self) -> EngineResult<ReplSetConfig>;

    /// Submits a replica-set configuration. The caller is responsible for
    /// having bumped the version.
    async fn reconfigure(&self, config: &ReplSetConfig, force: bool) -> EngineResult<()>;

    /// Creates the initial administrative user and reconnects in
    /// authenticated mode.
    async fn create_root_user(&self, username: &str, password: &str) -> EngineResult<()>;

    /// Asks the engine to relinquish primacy for `secs` seconds.
    /// "Not primary" is success: the goal state already holds.
    async fn step_down(&self, secs: u32) -> EngineResult<()>;

    /// Timestamp of the most recent oplog entry, if any.
    async fn latest_oplog(&self) -> EngineResult<Option<OplogStamp>>;

    /// Drops the current connection and opens a fresh one, preferring
    /// authenticated mode when credentials are configured.
    async fn reconnect(&self) -> EngineResult<()>;

    /// Asks the engine process to terminate. Used only by the nuclear
    /// resync path; the resulting connection drop is expected.
    async fn shutdown_engine(&self) -> EngineResult<()>;
}

struct Connection {
    client: Client,
    authenticated: bool,
}

/// The production engine adapter, speaking to the engine on loopback.
pub struct MongoEngine {
    config: EngineConfig,
    connection: RwLock<Connection>,
}

impl MongoEngine {
    /// Connects to the local engine.
    ///
    /// Tries the authenticated URI first when credentials are configured;
    /// if the engine rejects them (the root user does not exist yet and the
    /// localhost exception is active), falls back to an unauthenticated
    /// connection and records the mode.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unreachable`] when no connection can be
    /// established at all.
    pub async fn connect(config: EngineConfig) -> EngineResult<Self> {
        let connection = Self::open(&config).await?;
        info!(
            port = config.port,
            authenticated = connection.authenticated,
            "Connected to local engine"
        );
        Ok(Self { config, connection: RwLock::new(connection) })
    }

    async fn open(config: &EngineConfig) -> EngineResult<Connection> {
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            match Self::open_client(config.port, Some((username, password))).await {
                Ok(client) => return Ok(Connection { client, authenticated: true }),
                Err(EngineError::AuthRequired) => {
                    debug!("Authenticated connect rejected, using localhost exception");
                }
                Err(other) => return Err(other),
            }
        }

        let client = Self::open_client(config.port, None).await?;
        Ok(Connection { client, authenticated: false })
    }

    async fn open_client(
        port: u16,
        credentials: Option<(&str, &str)>,
    ) -> EngineResult<Client> {
        let client = build_client("127.0.0.1", port, credentials)?;
        // A ping proves both reachability and, when credentials are set,
        // that they are accepted.
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        Ok(client)
    }

    async fn client(&self) -> Client {
        self.connection.read().await.client.clone()
    }

    /// True when the current connection authenticated successfully.
    pub async fn authenticated(&self) -> bool {
        self.connection.read().await.authenticated
    }

    async fn run_admin_raw(&self, command: Document) -> mongodb::error::Result<Document> {
        self.client().await.database("admin").run_command(command).await
    }

    async fn run_admin(&self, command: Document) -> EngineResult<Document> {
        self.run_admin_raw(command).await.map_err(Into::into)
    }
}

#[async_trait]
impl EngineControl for MongoEngine {
    async fn status(&self) -> EngineResult<EngineState> {
        match self.run_admin_raw(doc! { "replSetGetStatus": 1 }).await {
            Ok(reply) => Ok(EngineState::Initialized(ReplSetStatus::from_document(&reply)?)),
            Err(err) => {
                // Some failures are themselves the answer.
                if let ErrorKind::Command(ref command) = *err.kind {
                    if let Some(state) =
                        state_from_status_error(command.code, &command.message)
                    {
                        return Ok(state);
                    }
                }
                Err(err.into())
            }
        }
    }

    async fn is_primary(&self) -> bool {
        match self.run_admin(doc! { "hello": 1 }).await {
            Ok(reply) => hello_is_writable_primary(&reply),
            Err(err) if err.is_unreachable() => {
                debug!(error = %err, "Hello probe failed, reconnecting once");
                if self.reconnect().await.is_err() {
                    return false;
                }
                match self.run_admin(doc! { "hello": 1 }).await {
                    Ok(reply) => hello_is_writable_primary(&reply),
                    Err(_) => false,
                }
            }
            Err(err) => {
                debug!(error = %err, "Hello probe failed");
                false
            }
        }
    }

    async fn initiate(&self, host: &str) -> EngineResult<()> {
        let config = ReplSetConfig::single_member(&self.config.replica_set, host);
        let config_doc =
            to_document(&config).map_err(|e| EngineError::Unknown(e.to_string()))?;

        match self.run_admin(doc! { "replSetInitiate": config_doc }).await {
            Ok(_) => {
                info!(host = host, set = %self.config.replica_set, "Replica set initiated");
                Ok(())
            }
            Err(EngineError::AlreadyInitialized) => {
                debug!("Replica set already initiated");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn get_config(&self) -> EngineResult<ReplSetConfig> {
        let reply = self.run_admin(doc! { "replSetGetConfig": 1 }).await?;
        let config_doc = reply.get_document("config").map_err(|_| {
            EngineError::Unknown("replSetGetConfig reply missing 'config'".to_string())
        })?;
        from_document(config_doc.clone()).map_err(|e| EngineError::Unknown(e.to_string()))
    }

    async fn reconfigure(&self, config: &ReplSetConfig, force: bool) -> EngineResult<()> {
        let config_doc =
            to_document(config).map_err(|e| EngineError::Unknown(e.to_string()))?;
        self.run_admin(doc! { "replSetReconfig": config_doc, "force": force }).await?;
        info!(version = config.version, force = force, "Replica set reconfigured");
        Ok(())
    }

    async fn create_root_user(&self, username: &str, password: &str) -> EngineResult<()> {
        self.run_admin(doc! {
            "createUser": username,
            "pwd": password,
            "roles": [ { "role": "root", "db": "admin" } ],
        })
        .await?;
        info!(username = username, "Created root user");

        // The localhost exception closes once the first user exists;
        // switch to the authenticated connection now.
        self.reconnect().await
    }

    async fn step_down(&self, secs: u32) -> EngineResult<()> {
        match self.run_admin(doc! { "replSetStepDown": i64::from(secs) }).await {
            Ok(_) => Ok(()),
            // Already a secondary: the goal state holds.
            Err(EngineError::NotPrimary) => Ok(()),
            // The engine drops connections while stepping down.
            Err(EngineError::Unreachable(msg)) => {
                debug!(message = %msg, "Connection dropped during step-down");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn latest_oplog(&self) -> EngineResult<Option<OplogStamp>> {
        let client = self.client().await;
        let oplog = client.database("local").collection::<Document>("oplog.rs");

        let mut cursor = oplog
            .find(doc! {})
            .sort(doc! { "$natural": -1 })
            .limit(1)
            .await
            .map_err(EngineError::from)?;

        let Some(entry) = cursor.try_next().await.map_err(EngineError::from)? else {
            return Ok(None);
        };

        match entry.get_timestamp("ts") {
            Ok(ts) => Ok(Some(OplogStamp::new(ts.time, ts.increment))),
            Err(_) => Ok(None),
        }
    }

    async fn reconnect(&self) -> EngineResult<()> {
        let fresh = Self::open(&self.config).await?;
        let mut connection = self.connection.write().await;
        *connection = fresh;
        debug!(authenticated = connection.authenticated, "Engine connection reopened");
        Ok(())
    }

    async fn shutdown_engine(&self) -> EngineResult<()> {
        warn!("Requesting engine shutdown");
        match self.run_admin(doc! { "shutdown": 1, "force": true }).await {
            // The engine terminates the connection rather than replying.
            Ok(_) | Err(EngineError::Unreachable(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Probes a peer's engine over its derived hostname and reports its
/// replica-set state.
///
/// Used by discovery-before-init: a node must not found a set while any
/// peer already has one. Credentials are tried when configured; a peer
/// that demands authentication has a root user, which only exists after a
/// set was founded, so `NeedsAuth` is as conclusive as `Initialized`.
///
/// # Errors
///
/// Returns [`EngineError::Unreachable`] when the peer cannot be reached
/// within the probe timeout.
pub async fn probe_remote_status(
    host: &str,
    port: u16,
    credentials: Option<(&str, &str)>,
) -> EngineResult<EngineState> {
    let client = build_client(host, port, credentials)?;

    match client.database("admin").run_command(doc! { "replSetGetStatus": 1 }).await {
        Ok(reply) => Ok(EngineState::Initialized(ReplSetStatus::from_document(&reply)?)),
        Err(err) => {
            if let ErrorKind::Command(ref command) = *err.kind {
                if let Some(state) = state_from_status_error(command.code, &command.message) {
                    return Ok(state);
                }
            }
            match EngineError::from(err) {
                EngineError::AuthRequired => Ok(EngineState::NeedsAuth),
                other => Err(other),
            }
        }
    }
}

fn build_client(
    host: &str,
    port: u16,
    credentials: Option<(&str, &str)>,
) -> EngineResult<Client> {
    let builder = ClientOptions::builder()
        .hosts(vec![ServerAddress::Tcp { host: host.to_string(), port: Some(port) }])
        .direct_connection(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .server_selection_timeout(SELECTION_TIMEOUT);

    let options = match credentials {
        Some((username, password)) => builder
            .credential(
                Credential::builder()
                    .username(username.to_string())
                    .password(password.to_string())
                    .source("admin".to_string())
                    .build(),
            )
            .build(),
        None => builder.build(),
    };

    Client::with_options(options).map_err(|e| EngineError::Unreachable(e.to_string()))
}

/// Interprets a `hello` (or legacy `isMaster`) reply.
fn hello_is_writable_primary(reply: &Document) -> bool {
    reply
        .get_bool("isWritablePrimary")
        .or_else(|_| reply.get_bool("ismaster"))
        .unwrap_or(false)
}
