//! Engine error types.
//!
//! Validation errors are model-facing: the dispatcher returns them from
//! tool `execute` so the host surfaces them back to the model as tool
//! errors, and no state is mutated. Everything else is logged and
//! swallowed at the call site per the engine's best-effort policy.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the dcp engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Model-facing validation failure; message text is shown to the model.
    #[error("{0}")]
    Validation(String),

    #[error("command handled: {0}")]
    CommandHandled(&'static str),

    #[error(transparent)]
    Storage(#[from] dcp_storage::StorageError),

    #[error(transparent)]
    Host(#[from] dcp_host::HostError),

    #[error("invalid tool arguments: {0}")]
    Arguments(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a model-facing validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    /// Whether this error should be surfaced to the model.
    pub fn is_model_facing(&self) -> bool {
        matches!(self, EngineError::Validation(_) | EngineError::Arguments(_))
    }
}

/// Sentinel messages signaling that a `/dcp` command fully handled the
/// turn and the host should not render any command output of its own.
pub mod sentinel {
    pub const CONTEXT: &str = "__DCP_CONTEXT_HANDLED__";
    pub const STATS: &str = "__DCP_STATS_HANDLED__";
    pub const SWEEP: &str = "__DCP_SWEEP_HANDLED__";
    pub const MANUAL: &str = "__DCP_MANUAL_HANDLED__";
    pub const TRIGGER: &str = "__DCP_TRIGGER_HANDLED__";
    pub const HELP: &str = "__DCP_HELP_HANDLED__";
}
