//! Session tracking: transition detection, compaction handling, and the
//! per-turn tool-cache sync.
//!
//! The authoritative session id for a turn is taken from the last
//! non-ignored user message. A host compaction shows up as an assistant
//! message flagged `summary=true`; everything downstream of the old
//! transcript is invalid at that point and gets cleared.

use crate::config::{is_pruning_tool, DcpConfig};
use crate::state::{SessionState, ToolCacheEntry};
use dcp_host::{MessageWithParts, Part};
use serde_json::Value;
use tracing::debug;

/// Outcome of [`check_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// Same session as before.
    Unchanged,
    /// The transcript belongs to a different session; state was reset
    /// and the caller should load the sidecar for the new id.
    Changed { session_id: String },
    /// No user message found; nothing to do this turn.
    NoSession,
}

/// Find the authoritative session id: the last non-ignored user message.
pub fn authoritative_session_id(messages: &[MessageWithParts]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_user() && !m.is_ignored())
        .map(|m| m.info.session_id.as_str())
}

/// Detect a session transition and reset state if one happened.
pub fn check_session(state: &mut SessionState, messages: &[MessageWithParts]) -> SessionCheck {
    let Some(session_id) = authoritative_session_id(messages) else {
        return SessionCheck::NoSession;
    };

    if state.session_id.as_deref() == Some(session_id) {
        return SessionCheck::Unchanged;
    }

    debug!(
        old = state.session_id.as_deref().unwrap_or("<none>"),
        new = session_id,
        "session changed, resetting state"
    );
    state.reset();
    state.session_id = Some(session_id.to_string());
    SessionCheck::Changed {
        session_id: session_id.to_string(),
    }
}

/// Detect a host compaction newer than the last one handled.
///
/// Scans newest to oldest; on detection clears the tool cache, both
/// prune sets, the compress summaries, and the nudge state.
pub fn detect_compaction(state: &mut SessionState, messages: &[MessageWithParts]) -> bool {
    let newest_summary = messages
        .iter()
        .rev()
        .find(|m| m.info.is_summary())
        .map(|m| m.info.time.created);

    match newest_summary {
        Some(created) if created > state.last_compaction => {
            debug!(created, "host compaction detected, clearing caches");
            state.apply_compaction(created);
            true
        }
        _ => false,
    }
}

/// Sync the tool cache with the transcript.
///
/// Updates `current_turn` from step-start markers, caches every settled
/// tool call not seen before, drives the nudge counter, and tracks
/// whether the most recent settled tool was a pruning tool.
pub fn sync_tool_cache(
    state: &mut SessionState,
    messages: &[MessageWithParts],
    config: &DcpConfig,
) {
    state.current_turn = messages
        .iter()
        .flat_map(|m| &m.parts)
        .filter(|p| matches!(p, Part::StepStart(_)))
        .count() as u64;

    for message in messages {
        for tool in message.tool_parts() {
            if !tool.state.is_settled() || state.has_tool(&tool.call_id) {
                continue;
            }

            let parameters = match tool.state.input() {
                Value::Null => Value::Object(Default::default()),
                other => other.clone(),
            };
            state.cache_tool(
                &tool.call_id,
                ToolCacheEntry {
                    tool: tool.tool.clone(),
                    parameters,
                    status: tool.state.status().to_string(),
                    error: tool.state.error().map(str::to_string),
                    turn: state.current_turn,
                    compacted: false,
                },
            );

            if !config.is_tool_protected(&tool.tool) {
                state.nudge_counter += 1;
            }
            state.last_tool_prune = is_pruning_tool(&tool.tool);
        }
    }
}

/// Rebuild the index→id dictionary from the transcript.
///
/// Every tool-call-id is recorded at its first-seen position so the
/// numeric indices the model already saw stay stable within a turn.
pub fn rebuild_tool_id_list(state: &mut SessionState, messages: &[MessageWithParts]) {
    let mut list: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for message in messages {
        for tool in message.tool_parts() {
            let key = tool.call_id.to_lowercase();
            if seen.insert(key) {
                list.push(tool.call_id.clone());
            }
        }
    }
    state.tool_id_list = list;
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_host::{MessageInfo, Role, TextPart, ToolPart, ToolState};
    use serde_json::json;

    fn user_message(session_id: &str, text: &str) -> MessageWithParts {
        let mut msg = MessageWithParts::new(MessageInfo::new(Role::User, session_id));
        let id = msg.info.id.clone();
        msg.parts.push(Part::Text(TextPart::new(id, text)));
        msg
    }

    fn ignored_message(session_id: &str) -> MessageWithParts {
        let mut msg = user_message(session_id, "notice");
        if let Part::Text(text) = &mut msg.parts[0] {
            text.ignored = Some(true);
        }
        msg
    }

    fn assistant_with_tool(
        session_id: &str,
        call_id: &str,
        tool: &str,
        state: ToolState,
    ) -> MessageWithParts {
        let mut msg = MessageWithParts::new(MessageInfo::new(Role::Assistant, session_id));
        let id = msg.info.id.clone();
        msg.parts
            .push(Part::Tool(ToolPart::new(id, call_id, tool, state)));
        msg
    }

    fn completed(input: Value, output: &str) -> ToolState {
        ToolState::Completed {
            input,
            output: output.into(),
        }
    }

    #[test]
    fn test_authoritative_id_skips_ignored() {
        let messages = vec![user_message("ses_a", "hi"), ignored_message("ses_b")];
        assert_eq!(authoritative_session_id(&messages), Some("ses_a"));
    }

    #[test]
    fn test_check_session_binds_and_resets() {
        let mut state = SessionState::new();
        let messages = vec![user_message("ses_a", "hi")];
        assert_eq!(
            check_session(&mut state, &messages),
            SessionCheck::Changed {
                session_id: "ses_a".into()
            }
        );
        assert_eq!(check_session(&mut state, &messages), SessionCheck::Unchanged);

        state.nudge_counter = 7;
        let messages = vec![user_message("ses_b", "hi")];
        assert!(matches!(
            check_session(&mut state, &messages),
            SessionCheck::Changed { .. }
        ));
        assert_eq!(state.nudge_counter, 0);
        assert_eq!(state.session_id.as_deref(), Some("ses_b"));
    }

    #[test]
    fn test_check_session_empty_transcript() {
        let mut state = SessionState::new();
        assert_eq!(check_session(&mut state, &[]), SessionCheck::NoSession);
    }

    #[test]
    fn test_detect_compaction_clears_state() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("call_a");
        state.nudge_counter = 3;

        let mut summary = MessageWithParts::new(MessageInfo::new(Role::Assistant, "ses_a"));
        summary.info.summary = Some(true);
        summary.info.time.created = 500;

        assert!(detect_compaction(&mut state, &[summary.clone()]));
        assert!(state.prune.tool_ids.is_empty());
        assert_eq!(state.nudge_counter, 0);
        assert_eq!(state.last_compaction, 500);

        // The same summary is not processed twice.
        assert!(!detect_compaction(&mut state, &[summary]));
    }

    #[test]
    fn test_sync_caches_settled_tools_only() {
        let mut state = SessionState::new();
        let config = DcpConfig::default();
        let messages = vec![
            assistant_with_tool("ses_a", "call_done", "read", completed(json!({}), "out")),
            assistant_with_tool(
                "ses_a",
                "call_pending",
                "bash",
                ToolState::Running { input: json!({}) },
            ),
        ];
        sync_tool_cache(&mut state, &messages, &config);
        assert!(state.has_tool("call_done"));
        assert!(!state.has_tool("call_pending"));
        assert_eq!(state.nudge_counter, 1);
    }

    #[test]
    fn test_sync_null_input_becomes_empty_object() {
        let mut state = SessionState::new();
        let config = DcpConfig::default();
        let messages = vec![assistant_with_tool(
            "ses_a",
            "call_a",
            "read",
            completed(Value::Null, "out"),
        )];
        sync_tool_cache(&mut state, &messages, &config);
        assert!(state.tool_entry("call_a").unwrap().parameters.is_object());
    }

    #[test]
    fn test_sync_protected_tools_skip_nudge() {
        let mut state = SessionState::new();
        let config = DcpConfig::default();
        let messages = vec![assistant_with_tool(
            "ses_a",
            "call_t",
            "task",
            completed(json!({}), "done"),
        )];
        sync_tool_cache(&mut state, &messages, &config);
        assert!(state.has_tool("call_t"));
        assert_eq!(state.nudge_counter, 0);
    }

    #[test]
    fn test_sync_tracks_last_tool_prune() {
        let mut state = SessionState::new();
        let config = DcpConfig::default();

        let messages = vec![assistant_with_tool(
            "ses_a",
            "call_p",
            "prune",
            completed(json!({}), "pruned"),
        )];
        sync_tool_cache(&mut state, &messages, &config);
        assert!(state.last_tool_prune);

        let messages = vec![
            assistant_with_tool("ses_a", "call_p", "prune", completed(json!({}), "pruned")),
            assistant_with_tool("ses_a", "call_r", "read", completed(json!({}), "out")),
        ];
        sync_tool_cache(&mut state, &messages, &config);
        assert!(!state.last_tool_prune);
    }

    #[test]
    fn test_sync_counts_turns() {
        let mut state = SessionState::new();
        let config = DcpConfig::default();
        let mut msg = MessageWithParts::new(MessageInfo::new(Role::Assistant, "ses_a"));
        let id = msg.info.id.clone();
        msg.parts.push(Part::StepStart(dcp_host::message::StepStartPart {
            id: "prt_s1".into(),
            message_id: id.clone(),
        }));
        msg.parts.push(Part::StepStart(dcp_host::message::StepStartPart {
            id: "prt_s2".into(),
            message_id: id,
        }));
        sync_tool_cache(&mut state, &[msg], &config);
        assert_eq!(state.current_turn, 2);
    }

    #[test]
    fn test_rebuild_tool_id_list_first_seen_order() {
        let mut state = SessionState::new();
        let messages = vec![
            assistant_with_tool("ses_a", "call_B", "read", completed(json!({}), "1")),
            assistant_with_tool("ses_a", "call_a", "bash", completed(json!({}), "2")),
            // Same id in different case is not a new entry.
            assistant_with_tool("ses_a", "CALL_B", "read", completed(json!({}), "3")),
        ];
        rebuild_tool_id_list(&mut state, &messages);
        assert_eq!(state.tool_id_list, vec!["call_B", "call_a"]);
        assert_eq!(state.tool_id_at(1), Some("call_a"));
        assert_eq!(state.tool_id_at(9), None);
    }
}
