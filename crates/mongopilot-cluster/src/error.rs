//! Error type for cluster operations.

use thiserror::Error;

use mongopilot_engine::EngineError;

/// A specialized `Result` type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Errors raised by the control plane.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Core controller error (config, identity, registry, I/O).
    #[error(transparent)]
    Core(#[from] mongopilot_core::Error),

    /// Engine command failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Bootstrap could not complete.
    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    /// The controller must exit so the supervisor restarts it into a fresh
    /// bootstrap; raised after the nuclear-resync data wipe.
    #[error("resync restart required: {0}")]
    ResyncRestart(String),
}
