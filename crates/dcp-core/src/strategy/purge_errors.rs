//! Stale-error purging.
//!
//! An errored tool call keeps its error text (the model may still need
//! it), but once the call is old enough its input is usually dead
//! weight: a failed multi-kilobyte patch or command transcript nobody
//! will retry verbatim.

use super::{input_tokens, Strategy, StrategyContext, StrategyReport};
use crate::config::DcpConfig;

pub struct PurgeErrors;

impl Strategy for PurgeErrors {
    fn name(&self) -> &'static str {
        "purge_errors"
    }

    fn enabled(&self, config: &DcpConfig) -> bool {
        config.strategies.purge_errors.enabled
    }

    fn run(&self, ctx: &mut StrategyContext) {
        let threshold = ctx.config.strategies.purge_errors.turns;
        let current_turn = ctx.state.current_turn;

        let mut marked: Vec<(String, String, u64)> = Vec::new();
        for call_id in &ctx.state.tool_id_list {
            if ctx.state.is_pruned(call_id) {
                continue;
            }
            let Some(entry) = ctx.state.tool_entry(call_id) else {
                continue;
            };
            if entry.status != "error" || ctx.config.is_tool_protected(&entry.tool) {
                continue;
            }
            let age = current_turn.saturating_sub(entry.turn);
            if age >= threshold {
                marked.push((call_id.clone(), entry.tool.clone(), age));
            }
        }

        for (call_id, tool, age) in marked {
            let tokens = input_tokens(ctx.messages, &call_id);
            ctx.state.mark_tool_pruned(&call_id);
            ctx.state.record_savings(tokens);
            ctx.reports.push(StrategyReport::PurgeError {
                tool,
                pruned_id: call_id,
                age_turns: age,
            });
        }
    }
}
