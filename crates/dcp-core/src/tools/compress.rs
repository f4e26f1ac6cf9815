//! The `compress` tool.
//!
//! The model names a contiguous range of the conversation with two
//! boundary strings and authors the summary that replaces it. Boundary
//! strings must each match exactly once across the conversation,
//! including previously written compress summaries so ranges can nest.

use super::{Tool, ToolContext, ToolOutput, SUB_AGENT_MESSAGE};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::notify::{self, Notification};
use crate::prompt::COMPRESS_DESCRIPTION;
use crate::state::{CompressSummary, SessionState};
use dcp_host::{MessageWithParts, Part};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct CompressArgs {
    topic: String,
    content: CompressContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompressContent {
    start_string: String,
    end_string: String,
    summary: String,
}

pub struct CompressTool {
    engine: Arc<Engine>,
}

impl CompressTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for CompressTool {
    fn id(&self) -> &'static str {
        "compress"
    }

    fn description(&self) -> &'static str {
        COMPRESS_DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "Short name for the compressed range."
                },
                "content": {
                    "type": "object",
                    "properties": {
                        "startString": {
                            "type": "string",
                            "description": "Verbatim substring marking the start of the range; must occur exactly once."
                        },
                        "endString": {
                            "type": "string",
                            "description": "Verbatim substring marking the end of the range; must occur exactly once."
                        },
                        "summary": {
                            "type": "string",
                            "description": "Replacement text carrying everything later work could need."
                        }
                    },
                    "required": ["startString", "endString", "summary"]
                }
            },
            "required": ["topic", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> EngineResult<ToolOutput> {
        let args: CompressArgs = serde_json::from_value(args)?;
        self.engine.execute_compress(&ctx.session_id, args).await
    }
}

/// Count occurrences of `needle` within one message, including any
/// compress summary anchored at it.
fn occurrences_in_message(
    state: &SessionState,
    message: &MessageWithParts,
    needle: &str,
) -> usize {
    let mut count = 0;
    for summary in &state.compress_summaries {
        if summary.anchor_message_id == message.info.id {
            count += summary.summary.matches(needle).count();
        }
    }
    for part in &message.parts {
        match part {
            Part::Text(text) => count += text.text.matches(needle).count(),
            Part::Tool(tool) => {
                count += tool.state.input().to_string().matches(needle).count();
                if let Some(output) = tool.state.output() {
                    count += output.matches(needle).count();
                }
            }
            _ => {}
        }
    }
    count
}

/// Find the single message containing `needle`, or a validation error
/// naming the boundary that failed.
fn find_boundary(
    state: &SessionState,
    messages: &[MessageWithParts],
    needle: &str,
    label: &str,
) -> EngineResult<usize> {
    if needle.is_empty() {
        return Err(EngineError::validation(format!(
            "{label} must not be empty. Provide an exact substring from the conversation."
        )));
    }

    let mut found: Option<usize> = None;
    let mut total = 0usize;
    for (index, message) in messages.iter().enumerate() {
        let count = occurrences_in_message(state, message, needle);
        if count > 0 && found.is_none() {
            found = Some(index);
        }
        total += count;
        if total > 1 {
            return Err(EngineError::validation(format!(
                "Found multiple matches for {label}. Provide a longer, more specific string."
            )));
        }
    }

    found.ok_or_else(|| {
        EngineError::validation(format!(
            "{label} not found in conversation. Provide an exact substring from the conversation."
        ))
    })
}

/// Rough token weight of a message's visible content.
pub(crate) fn message_tokens(message: &MessageWithParts) -> u64 {
    let mut total = 0usize;
    for part in &message.parts {
        match part {
            Part::Text(text) => total += dcp_util::estimate_tokens(&text.text),
            Part::Tool(tool) => {
                total += dcp_util::estimate_tokens(&tool.state.input().to_string());
                if let Some(output) = tool.state.output() {
                    total += dcp_util::estimate_tokens(output);
                }
            }
            _ => {}
        }
    }
    total as u64
}

impl Engine {
    pub(crate) async fn execute_compress(
        &self,
        session_id: &str,
        args: CompressArgs,
    ) -> EngineResult<ToolOutput> {
        let handle = self.ensure_initialized(session_id).await;
        let mut state = handle.lock().await;
        if state.is_sub_agent {
            return Ok(ToolOutput::new("Sub-agent session", SUB_AGENT_MESSAGE));
        }

        let messages = self.host.session_messages(session_id).await?;

        let start = find_boundary(&state, &messages, &args.content.start_string, "startString")?;
        let end = find_boundary(&state, &messages, &args.content.end_string, "endString")?;
        if start > end {
            return Err(EngineError::validation(
                "startString appears after endString in the conversation. Swap the \
                 boundaries or pick different ones.",
            ));
        }

        let range = &messages[start..=end];
        let range_ids: HashSet<String> = range.iter().map(|m| m.info.id.clone()).collect();

        let mut tool_count = 0usize;
        let mut replaced_tokens = 0u64;
        for message in range {
            replaced_tokens += message_tokens(message);
            for tool in message.tool_parts() {
                state.mark_tool_pruned(&tool.call_id);
                if let Some(entry) = state.tool_entry_mut(&tool.call_id) {
                    entry.compacted = true;
                }
                tool_count += 1;
            }
            state.prune.message_ids.insert(message.info.id.clone());
        }

        // A range that swallows an older summary's anchor replaces it.
        state
            .compress_summaries
            .retain(|s| !range_ids.contains(&s.anchor_message_id));
        state.compress_summaries.push(CompressSummary {
            anchor_message_id: range[0].info.id.clone(),
            summary: args.content.summary.clone(),
        });

        let saved = replaced_tokens
            .saturating_sub(dcp_util::estimate_tokens(&args.content.summary) as u64);
        state.record_savings(saved);
        state.last_tool_prune = true;
        state.nudge_counter = 0;

        notify::dispatch(
            self.host.as_ref(),
            &self.config,
            session_id,
            &Notification::Compressed {
                topic: args.topic.clone(),
                messages: range.len(),
                tools: tool_count,
                summary: args.content.summary.clone(),
            },
        )
        .await;
        self.persist(&state).await;

        Ok(ToolOutput::new(
            format!("Compressed \"{}\"", args.topic),
            format!(
                "Compressed \"{}\": {} message(s) and {} tool call(s) replaced by your \
                 summary (~{} tokens saved).",
                args.topic,
                range.len(),
                tool_count,
                notify::format_tokens(saved)
            ),
        ))
    }
}
