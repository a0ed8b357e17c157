//! Error types shared across the controller.

use thiserror::Error;

/// A specialized `Result` type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the controller's own machinery.
///
/// Engine-side failures have their own taxonomy in `mongopilot-engine`;
/// this type covers everything the sidecar does around the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing or malformed environment).
    #[error("configuration error: {0}")]
    Config(String),

    /// The node's own externally routable address could not be determined.
    ///
    /// This is fatal: a controller that does not know its own identity
    /// cannot safely participate in membership decisions.
    #[error("identity resolution failed: {0}")]
    Identity(String),

    /// The registry could not be reached or returned an unusable body.
    /// Transient; callers keep their last known state.
    #[error("registry error: {0}")]
    Registry(String),

    /// A peer RPC failed. Treated as an abstention by consensus tallies.
    #[error("peer rpc error: {0}")]
    PeerRpc(String),

    /// I/O error (hosts file, nsswitch, data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
