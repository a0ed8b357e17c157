// Copyright 2026 The Mongopilot Authors
// SPDX-License-Identifier: Apache-2.0

//! Read-only admin and peer RPC surface.
//!
//! Every controller serves the same endpoints it consumes from its peers:
//! `/health`, `/primary` and `/oplog` feed the consensus and safety gates,
//! while `/status`, `/members` and `/info` are operator read-throughs of
//! raw engine state. Nothing here mutates anything, and nothing here is
//! authenticated; the surface binds on the sidecar interface.

pub mod handlers;
pub mod router;

pub use handlers::AppState;
pub use router::create_router;
