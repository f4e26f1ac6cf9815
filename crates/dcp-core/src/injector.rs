//! Per-turn context injection.
//!
//! After redaction and strategies, the injector assembles up to three
//! text blocks - cooldown, the `<prunable-tools>` manifest (with squash
//! context), and a nudge - and appends them to the outgoing transcript
//! as a single synthetic message. Block wording is a model-visible
//! contract.

use crate::config::DcpConfig;
use crate::params::param_key;
use crate::prompt::render_nudge;
use crate::rewriter::{last_real_user, synthetic_message, synthetic_tool_part};
use crate::state::SessionState;
use dcp_host::{MessageWithParts, ModelRef, Role};
use tracing::debug;

/// Human-readable list of the enabled pruning tools.
fn enabled_tool_names(config: &DcpConfig) -> String {
    let mut names = Vec::new();
    if config.tools.prune.enabled {
        names.push("prune");
    }
    if config.tools.distill.enabled {
        names.push("distill");
    }
    if config.tools.compress.enabled {
        names.push("compress");
    }
    match names.as_slice() {
        [] => "context management tools".to_string(),
        [only] => format!("{only} tool"),
        [a, b] => format!("{a} or {b} tools"),
        [a, b, c] => format!("{a}, {b} or {c} tools"),
        _ => unreachable!(),
    }
}

/// The cooldown block injected right after a successful pruning call.
pub fn cooldown_block(config: &DcpConfig) -> String {
    format!(
        "<context-info>Context management was just performed. Do NOT use the {} again. \
         A fresh list will be available after your next tool use.</context-info>",
        enabled_tool_names(config)
    )
}

/// Build the `<prunable-tools>` manifest, or `None` when empty.
pub fn manifest_block(state: &SessionState, config: &DcpConfig) -> Option<String> {
    let mut lines = Vec::new();
    for (index, call_id) in state.tool_id_list.iter().enumerate() {
        let Some(entry) = state.tool_entry(call_id) else {
            continue; // pending, or evicted
        };
        if entry.compacted
            || state.is_pruned(call_id)
            || config.is_tool_protected(&entry.tool)
        {
            continue;
        }
        lines.push(format!(
            "{index}: {}, {}",
            entry.tool,
            param_key(&entry.tool, &entry.parameters)
        ));
    }

    if lines.is_empty() {
        return None;
    }
    Some(format!("<prunable-tools>\n{}\n</prunable-tools>", lines.join("\n")))
}

/// Build the `<squash-context>` block for the compress tool.
pub fn squash_block(state: &SessionState, messages: &[MessageWithParts]) -> String {
    let live = messages
        .iter()
        .filter(|m| !state.prune.message_ids.contains(&m.info.id))
        .count();
    format!(
        "<squash-context>\nLive messages in conversation: {live}\nUse startString/endString \
         boundaries that each occur exactly once.\n</squash-context>"
    )
}

/// Assemble the full injection text for this turn, if any.
pub fn build_context(
    state: &SessionState,
    config: &DcpConfig,
    messages: &[MessageWithParts],
) -> Option<String> {
    if !config.any_tool_enabled() {
        return None;
    }

    // Cooldown suppresses everything else for one turn.
    if state.last_tool_prune {
        return Some(cooldown_block(config));
    }

    let mut blocks = Vec::new();

    if config.manifest_enabled() {
        if let Some(manifest) = manifest_block(state, config) {
            blocks.push(manifest);
        }
    }

    if config.tools.compress.enabled {
        blocks.push(squash_block(state, messages));
    }

    let nudge_due = config.tools.settings.nudge_enabled
        && !state.manual_mode
        && state.nudge_counter >= config.tools.settings.nudge_frequency;
    if nudge_due {
        blocks.push(render_nudge(config, state.nudge_counter));
    }

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}

/// Providers that drop reasoning if a bare assistant text injection
/// follows the transcript; they get a synthetic tool part instead.
fn wants_tool_part_injection(model: Option<&ModelRef>) -> bool {
    let Some(model) = model else {
        return false;
    };
    let haystack = format!(
        "{}/{}",
        model.provider_id.to_lowercase(),
        model.model_id.to_lowercase()
    );
    ["deepseek", "kimi", "moonshot"]
        .iter()
        .any(|family| haystack.contains(family))
}

/// Append the context text to the transcript with provider-appropriate
/// role placement. Returns whether anything was appended.
pub fn inject(
    state: &SessionState,
    config: &DcpConfig,
    messages: &mut Vec<MessageWithParts>,
) -> bool {
    let Some(text) = build_context(state, config, messages) else {
        return false;
    };
    let Some(template) = last_real_user(messages).cloned() else {
        return false;
    };

    let last_is_user = messages
        .iter()
        .rev()
        .find(|m| !m.is_ignored())
        .is_some_and(|m| m.is_user());

    if last_is_user {
        messages.push(synthetic_message(Role::User, "context", &template, text));
    } else if wants_tool_part_injection(template.info.model.as_ref().or(state_model(state))) {
        if let Some(assistant) = messages.iter_mut().rev().find(|m| m.is_assistant()) {
            let message_id = assistant.info.id.clone();
            assistant
                .parts
                .push(synthetic_tool_part("context", &message_id, text));
        } else {
            messages.push(synthetic_message(Role::User, "context", &template, text));
        }
    } else {
        messages.push(synthetic_message(Role::Assistant, "context", &template, text));
    }

    debug!("context injection appended");
    true
}

fn state_model(state: &SessionState) -> Option<&ModelRef> {
    state.model.as_ref()
}
