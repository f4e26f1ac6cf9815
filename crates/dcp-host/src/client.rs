//! Host RPC client.
//!
//! The engine calls back into the host for a handful of operations:
//! session lookup, transcript fetch, sending a user-visible (but
//! model-invisible) prompt, and toasts. Every call site treats failures
//! as best-effort per the engine's error policy.

use crate::error::HostResult;
use crate::message::MessageWithParts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Session metadata from `session.get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    /// Parent session, set for sub-agent sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub title: String,
}

impl Session {
    /// Sub-agent sessions are inert for the engine.
    pub fn is_sub_agent(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toast {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn new(message: impl Into<String>, variant: ToastVariant) -> Self {
        Self {
            title: None,
            message: message.into(),
            variant,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// The host RPC surface the engine consumes.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// Fetch session metadata.
    async fn session_get(&self, session_id: &str) -> HostResult<Session>;

    /// Fetch the full transcript for a session.
    async fn session_messages(&self, session_id: &str) -> HostResult<Vec<MessageWithParts>>;

    /// Send a synthetic user prompt into a session.
    ///
    /// With `ignored=true` the text renders for the user but is excluded
    /// from what the model sees; this is the notification channel.
    async fn session_prompt(&self, session_id: &str, text: &str, ignored: bool) -> HostResult<()>;

    /// Show a toast in the host UI.
    async fn show_toast(&self, toast: Toast) -> HostResult<()>;
}
