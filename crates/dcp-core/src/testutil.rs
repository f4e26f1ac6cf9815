//! Shared test support: a scripted host and transcript builders.

use dcp_host::{
    HostClient, HostResult, MessageInfo, MessageWithParts, Part, Role, Session, TextPart, Toast,
    ToolPart, ToolState,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Scripted [`HostClient`] recording everything the engine sends.
#[derive(Clone, Default)]
pub(crate) struct TestHost {
    sub_agents: Arc<Mutex<Vec<String>>>,
    messages: Arc<Mutex<Vec<MessageWithParts>>>,
    pub(crate) prompts: Arc<Mutex<Vec<(String, String, bool)>>>,
    pub(crate) toasts: Arc<Mutex<Vec<Toast>>>,
}

impl TestHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_sub_agent(&self, session_id: &str) {
        self.sub_agents.lock().unwrap().push(session_id.to_string());
    }

    pub(crate) fn set_messages(&self, messages: Vec<MessageWithParts>) {
        *self.messages.lock().unwrap() = messages;
    }
}

#[async_trait::async_trait]
impl HostClient for TestHost {
    async fn session_get(&self, session_id: &str) -> HostResult<Session> {
        Ok(Session {
            id: session_id.to_string(),
            parent_id: self
                .sub_agents
                .lock()
                .unwrap()
                .contains(&session_id.to_string())
                .then(|| "ses_parent".to_string()),
            title: String::new(),
        })
    }

    async fn session_messages(&self, _session_id: &str) -> HostResult<Vec<MessageWithParts>> {
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn session_prompt(&self, session_id: &str, text: &str, ignored: bool) -> HostResult<()> {
        self.prompts
            .lock()
            .unwrap()
            .push((session_id.to_string(), text.to_string(), ignored));
        Ok(())
    }

    async fn show_toast(&self, toast: Toast) -> HostResult<()> {
        self.toasts.lock().unwrap().push(toast);
        Ok(())
    }
}

/// A user message with one text part.
pub(crate) fn user_message(session_id: &str, text: &str) -> MessageWithParts {
    let mut msg = MessageWithParts::new(MessageInfo::new(Role::User, session_id));
    let id = msg.info.id.clone();
    msg.parts.push(Part::Text(TextPart::new(id, text)));
    msg
}

/// An assistant message with one completed tool part.
pub(crate) fn tool_message(
    session_id: &str,
    call_id: &str,
    tool: &str,
    input: Value,
    output: &str,
) -> MessageWithParts {
    let mut msg = MessageWithParts::new(MessageInfo::new(Role::Assistant, session_id));
    let id = msg.info.id.clone();
    msg.parts.push(Part::Tool(ToolPart::new(
        id,
        call_id,
        tool,
        ToolState::Completed {
            input,
            output: output.into(),
        },
    )));
    msg
}

/// A small `ses_a` transcript: user turn, a read, a bash call.
pub(crate) fn tool_transcript() -> Vec<MessageWithParts> {
    vec![
        user_message("ses_a", "please fix the bug"),
        tool_message(
            "ses_a",
            "call_read",
            "read",
            json!({"filePath": "/src/main.rs"}),
            &"fn main() {}\n".repeat(20),
        ),
        tool_message(
            "ses_a",
            "call_bash",
            "bash",
            json!({"command": "cargo check"}),
            "warning: unused variable",
        ),
    ]
}

/// A host whose `session.messages` returns the given transcript.
pub(crate) fn host_with_messages(messages: Vec<MessageWithParts>) -> TestHost {
    let host = TestHost::new();
    host.set_messages(messages);
    host
}
