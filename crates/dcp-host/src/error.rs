//! Host RPC error types.

use thiserror::Error;

/// Result type for host RPC calls.
pub type HostResult<T> = Result<T, HostError>;

/// Errors from host RPC calls.
///
/// All host RPCs are best-effort from the engine's point of view:
/// callers log these and continue.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("host rpc failed: {0}")]
    Rpc(String),
}

impl HostError {
    /// Create an RPC failure error.
    pub fn rpc(message: impl Into<String>) -> Self {
        HostError::Rpc(message.into())
    }
}
