//! Typed adapter over the local MongoDB engine's admin command interface.
//!
//! The rest of the controller never sees driver types or raw command
//! documents. This crate exposes a narrow trait, [`EngineControl`], whose
//! methods map one-to-one onto the admin commands the sidecar needs, and a
//! single implementation, [`MongoEngine`], that owns the connection and
//! normalizes the driver's errors into the controller's taxonomy.
//!
//! Error strings and numeric codes are a wire format here: the engine
//! reports conditions like "not yet initialized" or "replica set ID did not
//! match" through codes and message fragments, and this crate is the only
//! place allowed to match on them.

pub mod adapter;
pub mod error;
pub mod repl_config;
pub mod state;

pub use adapter::{probe_remote_status, EngineControl, MongoEngine};
pub use error::{EngineError, EngineResult};
pub use repl_config::{ReplMember, ReplSetConfig};
pub use state::{EngineState, MemberState, MemberStatus, ReplSetStatus};
