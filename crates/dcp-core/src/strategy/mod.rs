//! Automatic pruning strategies.
//!
//! Strategies run in a fixed order on every outgoing transform:
//! deduplicate, supersede-writes, purge-errors. Each appends call ids to
//! the session's prune set; the pipeline is additive, so a later
//! strategy never removes what an earlier one marked.

mod dedup;
mod purge_errors;
mod supersede;

pub use dedup::Deduplicate;
pub use purge_errors::PurgeErrors;
pub use supersede::SupersedeWrites;

use crate::config::DcpConfig;
use crate::state::SessionState;
use dcp_host::MessageWithParts;
use serde_json::{Map, Value};
use tracing::debug;

/// What a strategy did, for the notification layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyReport {
    Dedup {
        tool: String,
        param_key: String,
        duplicate_count: usize,
        pruned_ids: Vec<String>,
        kept_id: String,
    },
    Supersede {
        path: String,
        pruned_id: String,
    },
    PurgeError {
        tool: String,
        pruned_id: String,
        age_turns: u64,
    },
}

/// Shared context handed to each strategy.
pub struct StrategyContext<'a> {
    pub state: &'a mut SessionState,
    pub config: &'a DcpConfig,
    pub messages: &'a [MessageWithParts],
    pub reports: Vec<StrategyReport>,
}

/// A single automatic pruning rule.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self, config: &DcpConfig) -> bool;

    fn run(&self, ctx: &mut StrategyContext);
}

/// Run the full pipeline in its fixed order.
pub fn run_pipeline(
    state: &mut SessionState,
    config: &DcpConfig,
    messages: &[MessageWithParts],
) -> Vec<StrategyReport> {
    let strategies: [&dyn Strategy; 3] = [&Deduplicate, &SupersedeWrites, &PurgeErrors];

    let mut ctx = StrategyContext {
        state,
        config,
        messages,
        reports: Vec::new(),
    };

    for strategy in strategies {
        if !strategy.enabled(config) {
            continue;
        }
        let before = ctx.reports.len();
        strategy.run(&mut ctx);
        let added = ctx.reports.len() - before;
        if added > 0 {
            debug!(strategy = strategy.name(), marked = added, "strategy marked tool calls");
        }
    }

    ctx.reports
}

/// Normalize tool parameters for dedup signatures.
///
/// Drops null fields and rebuilds objects so serialization is key-sorted
/// regardless of input order; arrays keep their element order.
pub(crate) fn normalize_parameters(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, val) in map {
                if val.is_null() {
                    continue;
                }
                out.insert(key.clone(), normalize_parameters(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_parameters).collect()),
        other => other.clone(),
    }
}

/// Build the dedup signature `tool::normalized-json`.
pub(crate) fn signature(tool: &str, parameters: &Value) -> String {
    let normalized = normalize_parameters(parameters);
    format!(
        "{}::{}",
        tool.to_lowercase(),
        serde_json::to_string(&normalized).unwrap_or_default()
    )
}

/// Estimate the tokens a redaction will save for a cached call.
///
/// Looks up the live output (or, for input redaction, the input text) in
/// the transcript so savings are counted once, at mark time.
pub(crate) fn output_tokens(messages: &[MessageWithParts], call_id: &str) -> u64 {
    let call_id = call_id.to_lowercase();
    for message in messages {
        for tool in message.tool_parts() {
            if tool.call_id.to_lowercase() == call_id {
                if let Some(output) = tool.state.output() {
                    return dcp_util::estimate_tokens(output) as u64;
                }
                let input = tool.state.input();
                return dcp_util::estimate_tokens(&input.to_string()) as u64;
            }
        }
    }
    0
}

/// Estimate the tokens an input redaction will save for a cached call.
pub(crate) fn input_tokens(messages: &[MessageWithParts], call_id: &str) -> u64 {
    let call_id = call_id.to_lowercase();
    for message in messages {
        for tool in message.tool_parts() {
            if tool.call_id.to_lowercase() == call_id {
                return dcp_util::estimate_tokens(&tool.state.input().to_string()) as u64;
            }
        }
    }
    0
}
