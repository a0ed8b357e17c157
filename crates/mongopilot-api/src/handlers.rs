// Copyright 2026 The Mongopilot Authors
// SPDX-License-Identifier: Apache-2.0

//! Handlers for the admin / peer RPC endpoints.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use mongopilot_cluster::peers::{PeerOplog, PeerPrimary};
use mongopilot_core::NodeIdentity;
use mongopilot_engine::{EngineControl, EngineState};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Local engine adapter, read-only use.
    pub engine: Arc<dyn EngineControl>,
    /// This node's identity.
    pub identity: NodeIdentity,
    /// Engine listen port.
    pub engine_port: u16,
    /// Replica set name, for `/info`.
    pub replica_set: String,
}

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the controller runs.
    pub status: &'static str,
    /// Milliseconds since the epoch, so callers can spot stale proxies.
    pub timestamp: u64,
}

/// Node info response body.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// This node's derived hostname.
    pub hostname: String,
    /// This node's external address.
    pub ip: String,
    /// Replica set name.
    #[serde(rename = "replicaSet")]
    pub replica_set: String,
    /// Engine listen port.
    #[serde(rename = "enginePort")]
    pub engine_port: u16,
    /// Controller version.
    pub version: &'static str,
}

/// GET /health
///
/// Liveness of the controller itself, not of the engine. Peers use this
/// for reachability checks, including a node probing itself through its
/// own derived hostname before founding.
pub async fn health() -> Json<HealthResponse> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Json(HealthResponse { status: "ok", timestamp })
}

/// GET /primary
///
/// This node's opinion of who holds primacy. Feeds peers' split-brain
/// consensus tallies.
pub async fn primary(State(state): State<AppState>) -> Response {
    let (primary, is_primary) = match state.engine.status().await {
        Ok(EngineState::Initialized(status)) => (
            status.primary_host().map(str::to_string),
            status.is_self_primary(),
        ),
        Ok(_) => (None, false),
        Err(err) => {
            tracing::debug!(error = %err, "Status read failed for /primary");
            (None, false)
        }
    };

    Json(PeerPrimary { primary, is_primary }).into_response()
}

/// GET /oplog
///
/// This node's latest oplog position. Feeds peers' stale-data detection;
/// `null` means the engine has no oplog (or is unreachable), which peers
/// treat as an abstention.
pub async fn oplog(State(state): State<AppState>) -> Response {
    let timestamp = state.engine.latest_oplog().await.ok().flatten();

    Json(PeerOplog {
        hostname: state.identity.hostname.clone(),
        ip: state.identity.address.clone(),
        timestamp,
    })
    .into_response()
}

/// GET /status
///
/// Raw engine state read-through for operators.
pub async fn status(State(state): State<AppState>) -> Response {
    match state.engine.status().await {
        Ok(engine_state) => Json(engine_state).into_response(),
        Err(err) => engine_unavailable(&err),
    }
}

/// GET /members
///
/// The current replica-set configuration's member list.
pub async fn members(State(state): State<AppState>) -> Response {
    match state.engine.get_config().await {
        Ok(config) => Json(config).into_response(),
        Err(err) => engine_unavailable(&err),
    }
}

/// GET /info
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        hostname: state.identity.hostname.clone(),
        ip: state.identity.address.clone(),
        replica_set: state.replica_set.clone(),
        engine_port: state.engine_port,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn engine_unavailable(err: &mongopilot_engine::EngineError) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}
