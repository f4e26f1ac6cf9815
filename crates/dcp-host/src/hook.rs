//! Hook payload types.
//!
//! These mirror the host's hook surface: the engine observes chat
//! metadata, rewrites outgoing transcripts, intercepts `/dcp` commands,
//! and reacts to session status events.

use crate::message::ModelRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of the `chat.message` hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageInput {
    pub session_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,

    /// Model variant (e.g. reasoning effort).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Context window of the active model, in tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_context_limit: Option<u64>,
}

/// Payload of the `command.execute.before` hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandExecuteInput {
    pub command: String,
    pub session_id: String,
    #[serde(default)]
    pub arguments: String,
}

/// Session status carried by [`HostEvent::SessionStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Busy,
}

/// A host event delivered to the `event` hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties", rename_all = "kebab-case")]
pub enum HostEvent {
    #[serde(rename = "session.status")]
    SessionStatus {
        session_id: String,
        status: SessionStatus,
    },

    /// Any event the engine does not care about.
    #[serde(other)]
    Other,
}

/// Raw event passthrough for hosts that deliver untyped events.
pub fn parse_event(value: &Value) -> HostEvent {
    serde_json::from_value(value.clone()).unwrap_or(HostEvent::Other)
}
