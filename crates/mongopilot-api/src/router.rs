// Copyright 2026 The Mongopilot Authors
// SPDX-License-Identifier: Apache-2.0

//! Router configuration for the admin / peer RPC surface.

use axum::routing::get;
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::{self, AppState};

/// Creates the admin / peer RPC router.
///
/// - `GET /health` - controller liveness
/// - `GET /primary` - this node's primary opinion
/// - `GET /oplog` - this node's latest oplog position
/// - `GET /status` - raw engine state
/// - `GET /members` - current replica-set configuration
/// - `GET /info` - node identity and version
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/primary", get(handlers::primary))
        .route("/oplog", get(handlers::oplog))
        .route("/status", get(handlers::status))
        .route("/members", get(handlers::members))
        .route("/info", get(handlers::info))
        .with_state(state)
        .layer(trace_layer)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use mongopilot_cluster::testing::MockEngine;
    use mongopilot_core::{NodeIdentity, OplogStamp};
    use mongopilot_engine::{
        EngineState, MemberState, MemberStatus, ReplMember, ReplSetConfig, ReplSetStatus,
    };

    use super::*;

    fn state_with(engine: Arc<MockEngine>) -> AppState {
        AppState {
            engine,
            identity: NodeIdentity::new("10.0.0.1"),
            engine_port: 27017,
            replica_set: "rs0".to_string(),
        }
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    fn primary_status() -> ReplSetStatus {
        ReplSetStatus {
            set_name: "rs0".to_string(),
            my_state: MemberState::Primary,
            members: vec![
                MemberStatus {
                    id: 0,
                    name: "mongo-10-0-0-1.mongo-cluster:27017".to_string(),
                    state: MemberState::Primary,
                    healthy: true,
                    is_self: true,
                },
                MemberStatus {
                    id: 1,
                    name: "mongo-10-0-0-2.mongo-cluster:27017".to_string(),
                    state: MemberState::Secondary,
                    healthy: true,
                    is_self: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(state_with(Arc::new(MockEngine::new())));
        let (status, body) = get_json(router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_primary_when_primary() {
        let engine = Arc::new(MockEngine::new());
        engine.push_status(EngineState::Initialized(primary_status()));
        let router = create_router(state_with(engine));

        let (status, body) = get_json(router, "/primary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["primary"], "mongo-10-0-0-1.mongo-cluster:27017");
        assert_eq!(body["isPrimary"], true);
    }

    #[tokio::test]
    async fn test_primary_when_not_initialized() {
        let router = create_router(state_with(Arc::new(MockEngine::new())));

        let (status, body) = get_json(router, "/primary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["primary"], serde_json::Value::Null);
        assert_eq!(body["isPrimary"], false);
    }

    #[tokio::test]
    async fn test_oplog_with_position() {
        let engine = Arc::new(MockEngine::new());
        engine.set_oplog(Some(OplogStamp::new(1_700_000_000, 4)));
        let router = create_router(state_with(engine));

        let (status, body) = get_json(router, "/oplog").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hostname"], "mongo-10-0-0-1.mongo-cluster");
        assert_eq!(body["ip"], "10.0.0.1");
        assert_eq!(body["timestamp"]["time"], 1_700_000_000_u32);
        assert_eq!(body["timestamp"]["counter"], 4);
    }

    #[tokio::test]
    async fn test_oplog_without_position() {
        let router = create_router(state_with(Arc::new(MockEngine::new())));

        let (status, body) = get_json(router, "/oplog").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["timestamp"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_status_read_through() {
        let engine = Arc::new(MockEngine::new());
        engine.push_status(EngineState::Initialized(primary_status()));
        let router = create_router(state_with(engine));

        let (status, body) = get_json(router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Initialized"]["set_name"], "rs0");
    }

    #[tokio::test]
    async fn test_members() {
        let engine = Arc::new(MockEngine::new());
        engine.set_config(ReplSetConfig {
            id: "rs0".to_string(),
            version: 2,
            members: vec![
                ReplMember::new(0, "mongo-10-0-0-1.mongo-cluster:27017"),
                ReplMember::new(1, "mongo-10-0-0-2.mongo-cluster:27017"),
            ],
            extra: Default::default(),
        });
        let router = create_router(state_with(engine));

        let (status, body) = get_json(router, "/members").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["_id"], "rs0");
        assert_eq!(body["version"], 2);
        assert_eq!(body["members"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_members_engine_unavailable() {
        // No config scripted: the mock reports an engine error.
        let router = create_router(state_with(Arc::new(MockEngine::new())));

        let (status, body) = get_json(router, "/members").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_info() {
        let router = create_router(state_with(Arc::new(MockEngine::new())));

        let (status, body) = get_json(router, "/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hostname"], "mongo-10-0-0-1.mongo-cluster");
        assert_eq!(body["replicaSet"], "rs0");
        assert_eq!(body["enginePort"], 27017);
    }
}
