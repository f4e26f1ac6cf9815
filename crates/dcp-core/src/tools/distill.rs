//! The `distill` tool.
//!
//! Behaves like `prune`, but the model supplies a distillation per
//! target: the knowledge worth keeping from the discarded output. The
//! engine never parses or verifies distillations; they exist for the
//! user's benefit in the notification.

use super::{resolve_indices, skipped_suffix, Tool, ToolContext, ToolOutput, SUB_AGENT_MESSAGE};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::notify::{self, DistillNote, Notification};
use crate::prompt::DISTILL_DESCRIPTION;
use crate::strategy::output_tokens;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Published argument form: an array of target objects.
#[derive(Debug, Deserialize)]
pub(crate) struct DistillTarget {
    id: String,
    distillation: String,
}

/// Both accepted argument forms. The parallel-array form is legacy but
/// still parsed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DistillArgs {
    Targets { targets: Vec<DistillTarget> },
    Parallel {
        ids: Vec<String>,
        distillations: Vec<String>,
    },
}

impl DistillArgs {
    fn into_targets(self) -> EngineResult<Vec<DistillTarget>> {
        match self {
            DistillArgs::Targets { targets } => Ok(targets),
            DistillArgs::Parallel { ids, distillations } => {
                if ids.len() != distillations.len() {
                    return Err(EngineError::validation(
                        "ids and distillations must have the same length.",
                    ));
                }
                Ok(ids
                    .into_iter()
                    .zip(distillations)
                    .map(|(id, distillation)| DistillTarget { id, distillation })
                    .collect())
            }
        }
    }
}

pub struct DistillTool {
    engine: Arc<Engine>,
}

impl DistillTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for DistillTool {
    fn id(&self) -> &'static str {
        "distill"
    }

    fn description(&self) -> &'static str {
        DISTILL_DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "targets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "Numeric index from <prunable-tools>."
                            },
                            "distillation": {
                                "type": "string",
                                "description": "The knowledge to preserve from this output."
                            }
                        },
                        "required": ["id", "distillation"]
                    }
                }
            },
            "required": ["targets"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> EngineResult<ToolOutput> {
        let targets = serde_json::from_value::<DistillArgs>(args)?.into_targets()?;
        self.engine.execute_distill(&ctx.session_id, targets).await
    }
}

impl Engine {
    pub(crate) async fn execute_distill(
        &self,
        session_id: &str,
        targets: Vec<DistillTarget>,
    ) -> EngineResult<ToolOutput> {
        let handle = self.ensure_initialized(session_id).await;
        let mut state = handle.lock().await;
        if state.is_sub_agent {
            return Ok(ToolOutput::new("Sub-agent session", SUB_AGENT_MESSAGE));
        }

        let ids: Vec<String> = targets.iter().map(|t| t.id.clone()).collect();
        let (resolved, skipped) = resolve_indices(&state, &self.config, &ids)?;
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
        let mut notes = Vec::new();
        for target in &resolved {
            tokens += output_tokens(&messages, &target.call_id);
            state.mark_tool_pruned(&target.call_id);
            if let Some(source) = targets.iter().find(|t| {
                t.id.trim().parse::<usize>().is_ok_and(|idx| idx == target.index)
            }) {
                notes.push(DistillNote {
                    tool: target.tool.clone(),
                    distillation: source.distillation.clone(),
                });
            }
        }
        state.record_savings(tokens);
        state.last_tool_prune = true;
        state.nudge_counter = 0;

        notify::dispatch(
            self.host.as_ref(),
            &self.config,
            session_id,
            &Notification::Distilled {
                count: resolved.len(),
                tokens,
                notes,
            },
        )
        .await;
        self.persist(&state).await;

        Ok(ToolOutput::new(
            format!("Distilled {} tool output(s)", resolved.len()),
            format!(
                "Distilled {} tool output(s) (~{} tokens saved). Your distillations were \
                 recorded for the user.{}",
                resolved.len(),
                notify::format_tokens(tokens),
                skipped_suffix(&skipped)
            ),
        ))
    }
}
