//! Engine error taxonomy.
//!
//! The engine signals conditions through numeric codes and message
//! fragments. Everything downstream branches on the variants below, never
//! on strings; this module is the single place where codes and fragments
//! are interpreted.

use thiserror::Error;

/// A specialized `Result` type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

// Server error codes the adapter branches on.
const CODE_UNAUTHORIZED: i32 = 13;
const CODE_AUTHENTICATION_FAILED: i32 = 18;
const CODE_ALREADY_INITIALIZED: i32 = 23;
const CODE_NOT_YET_INITIALIZED: i32 = 94;
const CODE_NOT_WRITABLE_PRIMARY: i32 = 10107;
const CODE_NOT_PRIMARY_NO_SECONDARY_OK: i32 = 13435;
const CODE_AUTH_LOCATION: i32 = 51003;

/// Errors surfaced by the engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine is not the primary; the current mutation must be
    /// abandoned. The cycle treats this as success and retries later.
    #[error("engine is not the primary")]
    NotPrimary,

    /// The connection is not authenticated against the replica set.
    #[error("engine requires authentication")]
    AuthRequired,

    /// The engine refused a reconfiguration because its stored replica-set
    /// identity differs from the submitted one. Two nodes initialized
    /// independently; only a data wipe reconciles them.
    #[error("replica set identity mismatch: {0}")]
    ReplicaSetMismatch(String),

    /// The engine process could not be reached.
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    /// The replica set was already initialized. Surfaced so `initiate` can
    /// treat it as success; never escapes the adapter.
    #[error("replica set already initialized")]
    AlreadyInitialized,

    /// Anything the adapter does not have a policy for.
    #[error("engine command failed: {0}")]
    Unknown(String),
}

impl EngineError {
    /// True for errors worth one reconnect-and-retry.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// True when a server message indicates a missing or failed authentication.
///
/// The engine phrases this several ways depending on version and command
/// ("requires authentication", "command ... requires authentication",
/// "Authentication failed").
#[must_use]
pub fn is_auth_message(message: &str) -> bool {
    message.contains("requires authentication") || message.contains("Authentication")
}

/// Classifies a server command error into the controller taxonomy.
#[must_use]
pub fn classify_command_error(code: i32, message: &str) -> EngineError {
    if message.contains("replica set ID did not match") {
        return EngineError::ReplicaSetMismatch(message.to_string());
    }
    match code {
        CODE_NOT_WRITABLE_PRIMARY | CODE_NOT_PRIMARY_NO_SECONDARY_OK => EngineError::NotPrimary,
        CODE_UNAUTHORIZED | CODE_AUTHENTICATION_FAILED | CODE_AUTH_LOCATION => {
            EngineError::AuthRequired
        }
        CODE_ALREADY_INITIALIZED => EngineError::AlreadyInitialized,
        _ if is_auth_message(message) => EngineError::AuthRequired,
        _ => EngineError::Unknown(format!("code {code}: {message}")),
    }
}

/// True when a status-command error means "no replica set exists yet".
#[must_use]
pub fn is_not_yet_initialized(code: i32) -> bool {
    code == CODE_NOT_YET_INITIALIZED
}

impl From<mongodb::error::Error> for EngineError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match *err.kind {
            ErrorKind::Command(ref command) => {
                classify_command_error(command.code, &command.message)
            }
            ErrorKind::Authentication { ref message, .. } => {
                if is_auth_message(message) {
                    EngineError::AuthRequired
                } else {
                    EngineError::Unknown(message.clone())
                }
            }
            ErrorKind::ServerSelection { ref message, .. } => {
                EngineError::Unreachable(message.clone())
            }
            ErrorKind::Io(ref io) => EngineError::Unreachable(io.to_string()),
            _ => EngineError::Unknown(err.to_string()),
        }
    }
}
