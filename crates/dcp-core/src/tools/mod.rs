//! Model-callable pruning tools.
//!
//! `prune`, `distill`, and `compress` share one executor skeleton:
//! resolve the session, short-circuit sub-agents, validate arguments
//! against the live tool-id list, mutate state, notify, persist. All
//! validation failures are returned as errors from `execute` so the host
//! surfaces them to the model, and no state is mutated on that path.

mod compress;
mod distill;
mod prune;

pub use compress::CompressTool;
pub use distill::DistillTool;
pub use prune::PruneTool;

pub(crate) use compress::message_tokens;

use crate::config::DcpConfig;
use crate::error::{EngineError, EngineResult};
use crate::state::SessionState;
use async_trait::async_trait;
use serde_json::Value;

/// Terminal response for sub-agent sessions.
pub const SUB_AGENT_MESSAGE: &str = "This session is a sub-agent and its context is not \
managed. Do not call this tool again; provide your final answer to the parent task instead.";

/// Context provided by the host for a tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_id: String,
}

/// Result of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Title/summary of the operation.
    pub title: String,
    /// Output text returned to the model.
    pub output: String,
}

impl ToolOutput {
    pub fn new(title: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output: output.into(),
        }
    }
}

/// The trait the host registers against.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool ID as the model calls it.
    fn id(&self) -> &'static str;

    /// Markdown description shown to the model.
    fn description(&self) -> &'static str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> EngineResult<ToolOutput>;
}

/// An index the model referenced, resolved to a live cached call.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub index: usize,
    pub call_id: String,
    pub tool: String,
}

/// An index that resolved but was not actionable.
#[derive(Debug, Clone)]
pub struct SkippedTarget {
    pub index: usize,
    pub reason: &'static str,
}

/// Resolve model-provided indices against the session's tool-id list.
///
/// Hard failures (empty list, non-numeric, out-of-range) reject the whole
/// call; soft failures (hallucinated, protected, already pruned) are
/// skipped and echoed back in the result string.
pub(crate) fn resolve_indices(
    state: &SessionState,
    config: &DcpConfig,
    ids: &[String],
) -> EngineResult<(Vec<ResolvedTarget>, Vec<SkippedTarget>)> {
    if ids.is_empty() {
        return Err(EngineError::validation(
            "No tool call IDs provided. Pass the numeric indices shown in <prunable-tools>.",
        ));
    }

    let mut indices = Vec::with_capacity(ids.len());
    for id in ids {
        let parsed: usize = id.trim().parse().map_err(|_| {
            EngineError::validation(format!(
                "Invalid IDs provided: {id:?} is not a numeric index from <prunable-tools>."
            ))
        })?;
        if parsed >= state.tool_id_list.len() {
            return Err(EngineError::validation(format!(
                "Invalid IDs provided: index {parsed} is out of range ({} tool calls tracked).",
                state.tool_id_list.len()
            )));
        }
        if !indices.contains(&parsed) {
            indices.push(parsed);
        }
    }

    let mut resolved = Vec::new();
    let mut skipped = Vec::new();
    for index in indices {
        let call_id = state.tool_id_list[index].clone();
        let Some(entry) = state.tool_entry(&call_id) else {
            skipped.push(SkippedTarget {
                index,
                reason: "not prunable this turn",
            });
            continue;
        };
        if config.is_tool_protected(&entry.tool) {
            skipped.push(SkippedTarget {
                index,
                reason: "protected tool",
            });
            continue;
        }
        let touches_protected_file = crate::params::extract_file_paths(&entry.tool, &entry.parameters)
            .iter()
            .any(|p| config.is_file_protected(p));
        if touches_protected_file {
            skipped.push(SkippedTarget {
                index,
                reason: "protected file",
            });
            continue;
        }
        if state.is_pruned(&call_id) {
            skipped.push(SkippedTarget {
                index,
                reason: "already pruned",
            });
            continue;
        }
        resolved.push(ResolvedTarget {
            index,
            call_id,
            tool: entry.tool.clone(),
        });
    }

    Ok((resolved, skipped))
}

/// Render the skipped-target suffix for result strings.
pub(crate) fn skipped_suffix(skipped: &[SkippedTarget]) -> String {
    if skipped.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = skipped
        .iter()
        .map(|s| format!("{} ({})", s.index, s.reason))
        .collect();
    format!(" Skipped: {}.", parts.join(", "))
}
