//! Message types as delivered by the host transform hook.
//!
//! Each message is an info header plus an ordered list of parts. Tool
//! calls appear as parts carrying an opaque `call_id` and a state machine
//! (`pending` → `running` → `completed`/`error`).

use dcp_util::id::{IdPrefix, Identifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Model reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider_id: String,
    pub model_id: String,
}

impl ModelRef {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
        }
    }
}

/// Message timestamp.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MessageTime {
    /// Creation timestamp (ms).
    pub created: i64,
}

/// Message header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Message ID.
    pub id: String,

    /// Author role.
    pub role: Role,

    /// Session ID.
    pub session_id: String,

    /// Timestamps.
    #[serde(default)]
    pub time: MessageTime,

    /// Agent handling this message.
    #[serde(default)]
    pub agent: String,

    /// Model that produced (or will answer) this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,

    /// Set on assistant messages that are host compaction summaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<bool>,

    /// Model variant (e.g. reasoning effort) observed on this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl MessageInfo {
    /// Create a message header with a fresh id and current timestamp.
    pub fn new(role: Role, session_id: impl Into<String>) -> Self {
        Self {
            id: Identifier::message(),
            role,
            session_id: session_id.into(),
            time: MessageTime {
                created: chrono::Utc::now().timestamp_millis(),
            },
            agent: String::new(),
            model: None,
            summary: None,
            variant: None,
        }
    }

    /// Whether this message is a host compaction summary.
    pub fn is_summary(&self) -> bool {
        self.role == Role::Assistant && self.summary == Some(true)
    }
}

/// A message with its parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWithParts {
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl MessageWithParts {
    pub fn new(info: MessageInfo) -> Self {
        Self {
            info,
            parts: Vec::new(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.info.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.info.role == Role::Assistant
    }

    /// Whether every text part is flagged ignored.
    ///
    /// Ignored messages are notification chrome the engine itself sent;
    /// they never drive session identification.
    pub fn is_ignored(&self) -> bool {
        let mut saw_text = false;
        for part in &self.parts {
            if let Part::Text(text) = part {
                saw_text = true;
                if text.ignored != Some(true) {
                    return false;
                }
            }
        }
        saw_text
    }

    /// Iterate tool parts.
    pub fn tool_parts(&self) -> impl Iterator<Item = &ToolPart> {
        self.parts.iter().filter_map(|p| match p {
            Part::Tool(t) => Some(t),
            _ => None,
        })
    }

    /// Iterate tool parts mutably.
    pub fn tool_parts_mut(&mut self) -> impl Iterator<Item = &mut ToolPart> {
        self.parts.iter_mut().filter_map(|p| match p {
            Part::Tool(t) => Some(t),
            _ => None,
        })
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if let Part::Text(text) = part {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&text.text);
            }
        }
        out
    }
}

/// A part of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text(TextPart),
    Tool(ToolPart),
    StepStart(StepStartPart),
    StepFinish(StepFinishPart),
}

/// Text part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextPart {
    pub id: String,
    pub message_id: String,
    pub text: String,

    /// Set on parts the engine injected itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,

    /// Set on parts the model must never see again (notification chrome).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<bool>,
}

impl TextPart {
    pub fn new(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Identifier::part(),
            message_id: message_id.into(),
            text: text.into(),
            synthetic: None,
            ignored: None,
        }
    }

    /// Create a synthetic text part with a deterministic id.
    pub fn synthetic(
        discriminator: &str,
        message_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Identifier::synthetic(IdPrefix::Part, discriminator),
            message_id: message_id.into(),
            text: text.into(),
            synthetic: Some(true),
            ignored: None,
        }
    }
}

/// Tool call part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPart {
    pub id: String,
    pub message_id: String,
    pub call_id: String,
    pub tool: String,
    pub state: ToolState,
}

impl ToolPart {
    pub fn new(
        message_id: impl Into<String>,
        call_id: impl Into<String>,
        tool: impl Into<String>,
        state: ToolState,
    ) -> Self {
        Self {
            id: Identifier::part(),
            message_id: message_id.into(),
            call_id: call_id.into(),
            tool: tool.into(),
            state,
        }
    }
}

/// Assistant step boundary (start).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStartPart {
    pub id: String,
    pub message_id: String,
}

/// Assistant step boundary (finish).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFinishPart {
    pub id: String,
    pub message_id: String,
}

/// Tool execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolState {
    Pending {
        #[serde(default)]
        input: Value,
    },
    Running {
        #[serde(default)]
        input: Value,
    },
    Completed {
        #[serde(default)]
        input: Value,
        output: String,
    },
    Error {
        #[serde(default)]
        input: Value,
        error: String,
    },
}

impl ToolState {
    /// Status discriminant as the host spells it.
    pub fn status(&self) -> &'static str {
        match self {
            ToolState::Pending { .. } => "pending",
            ToolState::Running { .. } => "running",
            ToolState::Completed { .. } => "completed",
            ToolState::Error { .. } => "error",
        }
    }

    /// Tool input parameters.
    pub fn input(&self) -> &Value {
        match self {
            ToolState::Pending { input }
            | ToolState::Running { input }
            | ToolState::Completed { input, .. }
            | ToolState::Error { input, .. } => input,
        }
    }

    /// Mutable tool input parameters.
    pub fn input_mut(&mut self) -> &mut Value {
        match self {
            ToolState::Pending { input }
            | ToolState::Running { input }
            | ToolState::Completed { input, .. }
            | ToolState::Error { input, .. } => input,
        }
    }

    /// Tool output text, if completed.
    pub fn output(&self) -> Option<&str> {
        match self {
            ToolState::Completed { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Replace the output text of a completed call. No-op otherwise.
    pub fn set_output(&mut self, new_output: impl Into<String>) {
        if let ToolState::Completed { output, .. } = self {
            *output = new_output.into();
        }
    }

    /// Error text, if errored.
    pub fn error(&self) -> Option<&str> {
        match self {
            ToolState::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ToolState::Completed { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolState::Error { .. })
    }

    /// Whether the call finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        self.is_completed() || self.is_error()
    }
}
