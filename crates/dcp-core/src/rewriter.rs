//! In-place mutation of the outgoing message stream.
//!
//! Two redaction modes, both keyed off the session's prune set:
//! completed tool outputs are replaced with a fixed placeholder, while
//! `write`/`edit` calls keep their outputs and lose their bulky input
//! strings instead. Messages covered by a compress range are left in the
//! array (cache prefix stability) and have their content swapped for the
//! anchored summary.

use crate::state::SessionState;
use dcp_host::{MessageInfo, MessageWithParts, Part, Role, TextPart, ToolPart, ToolState};
use serde_json::Value;

/// Replacement for pruned tool outputs.
pub const OUTPUT_PLACEHOLDER: &str =
    "[Output removed to save context - information superseded or no longer needed]";

/// Replacement for superseded write/edit input strings.
pub const INPUT_PLACEHOLDER: &str =
    "[content removed to save context, this is not what was written to the file, but a placeholder]";

/// Replacement for stale errored-call inputs; the error text survives.
pub const ERROR_INPUT_PLACEHOLDER: &str =
    "[Input removed to save context - errored call input no longer needed]";

/// Apply output/input redactions for every pruned call id.
pub fn apply_redactions(state: &SessionState, messages: &mut [MessageWithParts]) {
    for message in messages.iter_mut() {
        // Compacted messages are handled by the compress-summary pass.
        if state.prune.message_ids.contains(&message.info.id) {
            continue;
        }
        for tool in message.tool_parts_mut() {
            if state.is_pruned(&tool.call_id) {
                redact_tool(tool);
            }
        }
    }
}

fn redact_tool(tool: &mut ToolPart) {
    match &mut tool.state {
        ToolState::Completed { input, output } => {
            match tool.tool.to_lowercase().as_str() {
                "write" => {
                    redact_field(input, "content", INPUT_PLACEHOLDER);
                }
                "edit" => {
                    redact_field(input, "oldString", INPUT_PLACEHOLDER);
                    redact_field(input, "newString", INPUT_PLACEHOLDER);
                }
                _ => *output = OUTPUT_PLACEHOLDER.to_string(),
            }
        }
        ToolState::Error { input, .. } => {
            // Keep the parameter shape, drop the bulk.
            if let Value::Object(map) = input {
                for value in map.values_mut() {
                    if value.is_string() {
                        *value = Value::String(ERROR_INPUT_PLACEHOLDER.to_string());
                    }
                }
            }
        }
        // Pending and running calls are never touched.
        ToolState::Pending { .. } | ToolState::Running { .. } => {}
    }
}

fn redact_field(input: &mut Value, field: &str, placeholder: &str) {
    if let Some(value) = input.get_mut(field) {
        *value = Value::String(placeholder.to_string());
    }
}

/// Replace the content of compacted messages with the anchored summary.
///
/// The anchor message of each compress range carries the model-authored
/// summary; every other message in the range keeps its part skeleton
/// with text emptied and tool payloads redacted, so provider-side
/// tool-call pairing stays intact.
pub fn apply_compress_summaries(state: &SessionState, messages: &mut [MessageWithParts]) {
    for message in messages.iter_mut() {
        if !state.prune.message_ids.contains(&message.info.id) {
            continue;
        }

        let anchored = state
            .compress_summaries
            .iter()
            .find(|s| s.anchor_message_id == message.info.id);

        for part in message.parts.iter_mut() {
            match part {
                Part::Text(text) => text.text.clear(),
                Part::Tool(tool) => match &mut tool.state {
                    ToolState::Completed { input, output } => {
                        *input = Value::Object(Default::default());
                        *output = OUTPUT_PLACEHOLDER.to_string();
                    }
                    ToolState::Error { input, .. } => {
                        *input = Value::Object(Default::default());
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        if let Some(summary) = anchored {
            let text = TextPart::synthetic(
                "compress-summary",
                message.info.id.clone(),
                summary.summary.clone(),
            );
            match message
                .parts
                .iter_mut()
                .find_map(|p| match p {
                    Part::Text(t) => Some(t),
                    _ => None,
                }) {
                Some(first_text) => first_text.text = summary.summary.clone(),
                None => message.parts.insert(0, Part::Text(text)),
            }
        }
    }
}

/// Find the last real (non-ignored) user message, the template for
/// synthetic-message metadata.
pub fn last_real_user(messages: &[MessageWithParts]) -> Option<&MessageWithParts> {
    messages.iter().rev().find(|m| m.is_user() && !m.is_ignored())
}

/// Build a synthetic message inheriting session metadata from the last
/// real user message.
pub fn synthetic_message(
    role: Role,
    discriminator: &str,
    template: &MessageWithParts,
    text: String,
) -> MessageWithParts {
    let id = dcp_util::Identifier::synthetic(dcp_util::id::IdPrefix::Message, discriminator);
    let info = MessageInfo {
        id: id.clone(),
        role,
        session_id: template.info.session_id.clone(),
        time: template.info.time,
        agent: template.info.agent.clone(),
        model: template.info.model.clone(),
        summary: None,
        variant: template.info.variant.clone(),
    };

    let mut message = MessageWithParts::new(info);
    message
        .parts
        .push(Part::Text(TextPart::synthetic(discriminator, id, text)));
    message
}

/// Build a synthetic completed tool part for providers that refuse text
/// injections after assistant turns.
pub fn synthetic_tool_part(discriminator: &str, message_id: &str, text: String) -> Part {
    Part::Tool(ToolPart {
        id: dcp_util::Identifier::synthetic(dcp_util::id::IdPrefix::Part, discriminator),
        message_id: message_id.to_string(),
        call_id: format!("dcp_{discriminator}"),
        tool: "context".to_string(),
        state: ToolState::Completed {
            input: Value::Object(Default::default()),
            output: text,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CompressSummary;
    use dcp_host::ModelRef;
    use serde_json::json;

    fn message_with_tool(call_id: &str, tool: &str, state: ToolState) -> MessageWithParts {
        let mut msg = MessageWithParts::new(MessageInfo::new(Role::Assistant, "ses_a"));
        let id = msg.info.id.clone();
        msg.parts.push(Part::Tool(ToolPart::new(id, call_id, tool, state)));
        msg
    }

    fn completed(input: Value, output: &str) -> ToolState {
        ToolState::Completed {
            input,
            output: output.into(),
        }
    }

    #[test]
    fn test_output_redaction() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("call_a");
        let mut messages = vec![message_with_tool(
            "call_a",
            "bash",
            completed(json!({"command": "ls"}), "big output"),
        )];
        apply_redactions(&state, &mut messages);
        let tool = messages[0].tool_parts().next().unwrap();
        assert_eq!(tool.state.output(), Some(OUTPUT_PLACEHOLDER));
        assert_eq!(tool.state.input()["command"], "ls");
    }

    #[test]
    fn test_write_input_redaction_keeps_output() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("call_w");
        let mut messages = vec![message_with_tool(
            "call_w",
            "write",
            completed(json!({"filePath": "/x", "content": "whole file body"}), "wrote /x"),
        )];
        apply_redactions(&state, &mut messages);
        let tool = messages[0].tool_parts().next().unwrap();
        assert_eq!(tool.state.input()["content"], INPUT_PLACEHOLDER);
        assert_eq!(tool.state.input()["filePath"], "/x");
        assert_eq!(tool.state.output(), Some("wrote /x"));
    }

    #[test]
    fn test_edit_input_redaction() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("call_e");
        let mut messages = vec![message_with_tool(
            "call_e",
            "edit",
            completed(
                json!({"filePath": "/x", "oldString": "aaa", "newString": "bbb"}),
                "edited",
            ),
        )];
        apply_redactions(&state, &mut messages);
        let tool = messages[0].tool_parts().next().unwrap();
        assert_eq!(tool.state.input()["oldString"], INPUT_PLACEHOLDER);
        assert_eq!(tool.state.input()["newString"], INPUT_PLACEHOLDER);
        assert_eq!(tool.state.input()["filePath"], "/x");
    }

    #[test]
    fn test_errored_input_redaction_preserves_error() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("call_x");
        let mut messages = vec![message_with_tool(
            "call_x",
            "bash",
            ToolState::Error {
                input: json!({"command": "npm test", "timeout": 30}),
                error: "exit code 1".into(),
            },
        )];
        apply_redactions(&state, &mut messages);
        let tool = messages[0].tool_parts().next().unwrap();
        assert_eq!(tool.state.input()["command"], ERROR_INPUT_PLACEHOLDER);
        assert_eq!(tool.state.input()["timeout"], 30);
        assert_eq!(tool.state.error(), Some("exit code 1"));
    }

    #[test]
    fn test_running_calls_untouched() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("call_r");
        let mut messages = vec![message_with_tool(
            "call_r",
            "bash",
            ToolState::Running {
                input: json!({"command": "sleep 100"}),
            },
        )];
        apply_redactions(&state, &mut messages);
        let tool = messages[0].tool_parts().next().unwrap();
        assert_eq!(tool.state.input()["command"], "sleep 100");
    }

    #[test]
    fn test_unpruned_calls_untouched() {
        let state = SessionState::new();
        let mut messages = vec![message_with_tool(
            "call_a",
            "bash",
            completed(json!({}), "output"),
        )];
        apply_redactions(&state, &mut messages);
        assert_eq!(
            messages[0].tool_parts().next().unwrap().state.output(),
            Some("output")
        );
    }

    #[test]
    fn test_compacted_messages_skipped_by_redactor() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("call_a");
        let mut messages = vec![message_with_tool(
            "call_a",
            "bash",
            completed(json!({}), "output"),
        )];
        state.prune.message_ids.insert(messages[0].info.id.clone());
        apply_redactions(&state, &mut messages);
        assert_eq!(
            messages[0].tool_parts().next().unwrap().state.output(),
            Some("output")
        );
    }

    #[test]
    fn test_compress_summary_replaces_anchor_text() {
        let mut state = SessionState::new();
        let mut anchor = MessageWithParts::new(MessageInfo::new(Role::User, "ses_a"));
        let anchor_id = anchor.info.id.clone();
        anchor
            .parts
            .push(Part::Text(TextPart::new(anchor_id.clone(), "Phase A begin")));
        let mut follower = message_with_tool("call_a", "bash", completed(json!({"command": "x"}), "out"));
        let follower_id = follower.info.id.clone();
        follower
            .parts
            .push(Part::Text(TextPart::new(follower_id.clone(), "noise")));

        state.prune.message_ids.insert(anchor_id.clone());
        state.prune.message_ids.insert(follower_id);
        state.compress_summaries.push(CompressSummary {
            anchor_message_id: anchor_id,
            summary: "Phase A: built and tested the parser.".into(),
        });

        let mut messages = vec![anchor, follower];
        apply_compress_summaries(&state, &mut messages);

        assert_eq!(messages[0].text(), "Phase A: built and tested the parser.");
        assert_eq!(messages[1].text(), "");
        let tool = messages[1].tool_parts().next().unwrap();
        assert_eq!(tool.state.output(), Some(OUTPUT_PLACEHOLDER));
        assert!(tool.state.input().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_synthetic_message_inherits_metadata() {
        let mut template = MessageWithParts::new(MessageInfo::new(Role::User, "ses_a"));
        template.info.agent = "build".into();
        template.info.model = Some(ModelRef::new("anthropic", "claude-sonnet-4-5"));
        template.info.variant = Some("high".into());

        let msg = synthetic_message(Role::User, "context", &template, "hello".into());
        assert_eq!(msg.info.id, "msg_dcp_context");
        assert_eq!(msg.info.session_id, "ses_a");
        assert_eq!(msg.info.agent, "build");
        assert_eq!(msg.info.variant.as_deref(), Some("high"));
        assert_eq!(msg.text(), "hello");
        match &msg.parts[0] {
            Part::Text(t) => assert_eq!(t.synthetic, Some(true)),
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn test_synthetic_tool_part() {
        let part = synthetic_tool_part("context", "msg_1", "manifest".into());
        match part {
            Part::Tool(tool) => {
                assert_eq!(tool.call_id, "dcp_context");
                assert_eq!(tool.state.output(), Some("manifest"));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }
}
