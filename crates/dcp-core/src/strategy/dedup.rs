//! Duplicate tool-call detection.
//!
//! Tool calls with identical normalized parameters carry the same
//! information; only the newest occurrence is kept.

use super::{output_tokens, signature, Strategy, StrategyContext, StrategyReport};
use crate::config::DcpConfig;
use crate::params::param_key;
use std::collections::HashMap;

pub struct Deduplicate;

impl Strategy for Deduplicate {
    fn name(&self) -> &'static str {
        "deduplication"
    }

    fn enabled(&self, config: &DcpConfig) -> bool {
        config.strategies.deduplication.enabled
    }

    fn run(&self, ctx: &mut StrategyContext) {
        // Group live, unprotected, not-yet-pruned calls by signature, in
        // transcript order so the last entry of a group is the newest.
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for call_id in ctx.state.tool_id_list.clone() {
            let Some(entry) = ctx.state.tool_entry(&call_id) else {
                continue;
            };
            if ctx.config.is_tool_protected(&entry.tool) || ctx.state.is_pruned(&call_id) {
                continue;
            }
            let sig = signature(&entry.tool, &entry.parameters);
            let group = groups.entry(sig.clone()).or_insert_with(|| {
                order.push(sig);
                Vec::new()
            });
            group.push(call_id);
        }

        for sig in order {
            let ids = &groups[&sig];
            if ids.len() < 2 {
                continue;
            }

            let kept_id = ids.last().cloned().unwrap_or_default();
            let pruned_ids: Vec<String> = ids[..ids.len() - 1].to_vec();

            let (tool, key) = ctx
                .state
                .tool_entry(&kept_id)
                .map(|e| (e.tool.clone(), param_key(&e.tool, &e.parameters)))
                .unwrap_or_default();

            for id in &pruned_ids {
                let tokens = output_tokens(ctx.messages, id);
                ctx.state.mark_tool_pruned(id);
                ctx.state.record_savings(tokens);
            }

            ctx.reports.push(StrategyReport::Dedup {
                tool,
                param_key: key,
                duplicate_count: pruned_ids.len(),
                pruned_ids,
                kept_id,
            });
        }
    }
}
