//! The `prune` tool.

use super::{resolve_indices, skipped_suffix, Tool, ToolContext, ToolOutput, SUB_AGENT_MESSAGE};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::notify::{self, Notification};
use crate::prompt::PRUNE_DESCRIPTION;
use crate::strategy::output_tokens;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct PruneArgs {
    ids: Vec<String>,
}

pub struct PruneTool {
    engine: Arc<Engine>,
}

impl PruneTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for PruneTool {
    fn id(&self) -> &'static str {
        "prune"
    }

    fn description(&self) -> &'static str {
        PRUNE_DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Numeric indices from <prunable-tools>, as strings."
                }
            },
            "required": ["ids"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> EngineResult<ToolOutput> {
        let args: PruneArgs = serde_json::from_value(args)?;
        self.engine.execute_prune(&ctx.session_id, &args.ids).await
    }
}

impl Engine {
    pub(crate) async fn execute_prune(
        &self,
        session_id: &str,
        ids: &[String],
    ) -> EngineResult<ToolOutput> {
        let handle = self.ensure_initialized(session_id).await;
        let mut state = handle.lock().await;
        if state.is_sub_agent {
            return Ok(ToolOutput::new("Sub-agent session", SUB_AGENT_MESSAGE));
        }

        let (resolved, skipped) = resolve_indices(&state, &self.config, ids)?;
        if resolved.is_empty() {
            return Err(EngineError::validation(format!(
                "No prunable tool outputs for the provided IDs.{} Pick indices from the \
                 current <prunable-tools> list.",
                skipped_suffix(&skipped)
            )));
        }

        let messages = match self.host.session_messages(session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(session_id, %err, "transcript fetch failed, savings not counted");
                Vec::new()
            }
        };

        let mut tokens = 0u64;
        for target in &resolved {
            tokens += output_tokens(&messages, &target.call_id);
            state.mark_tool_pruned(&target.call_id);
        }
        state.record_savings(tokens);
        state.last_tool_prune = true;
        state.nudge_counter = 0;

        notify::dispatch(
            self.host.as_ref(),
            &self.config,
            session_id,
            &Notification::Pruned {
                count: resolved.len(),
                tokens,
            },
        )
        .await;
        self.persist(&state).await;

        Ok(ToolOutput::new(
            format!("Pruned {} tool output(s)", resolved.len()),
            format!(
                "Pruned {} tool output(s) (~{} tokens saved).{}",
                resolved.len(),
                notify::format_tokens(tokens),
                skipped_suffix(&skipped)
            ),
        ))
    }
}
