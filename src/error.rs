//! LWM2M client error types.
//!
//! # Error Classification
//!
//! Errors fall into two groups by how they reach the application:
//!
//! - **Synchronous**: returned directly from the failing call
//!   (`InvalidArgument`, `NotFound`, `BufferTooSmall`, `InvalidRange`, ...).
//!   These are local conditions and retrying without fixing the input is
//!   pointless.
//! - **Asynchronous**: raised by a service tick (`Protocol`, `Cancelled`) and
//!   delivered only to the session's `Error` callback.
//!
//! Raw engine status codes never appear in these variants; the session and
//! the TLV adapter translate them before they cross the public surface.

use thiserror::Error;

use crate::registry::Handle;

/// LWM2M client errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Lwm2mError {
    /// Malformed or missing caller input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No live session for the handle.
    #[error("Session not found: {0}")]
    NotFound(Handle),

    /// Storage for an object or payload could not be reserved.
    #[error("Out of memory: {0}")]
    NoMemory(String),

    /// The protocol engine reported a failure.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The protocol engine requested shutdown.
    #[error("Session cancelled by the protocol engine")]
    Cancelled,

    /// Caller buffer cannot hold the resource payload.
    #[error("Buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall {
        /// Payload length reported by the engine.
        needed: usize,
        /// Capacity of the caller buffer.
        capacity: usize,
    },

    /// Serialization succeeded but produced no output.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for LWM2M operations
pub type Result<T> = std::result::Result<T, Lwm2mError>;

impl From<toml::de::Error> for Lwm2mError {
    fn from(err: toml::de::Error) -> Self {
        Lwm2mError::Config(format!("Failed to parse config: {err}"))
    }
}
