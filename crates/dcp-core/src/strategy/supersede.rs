//! Superseded-write detection.
//!
//! A write whose target file is read later in the conversation is
//! redundant: the read already captures the resulting file state, so the
//! write's input content can be redacted.

use super::{input_tokens, Strategy, StrategyContext, StrategyReport};
use crate::config::DcpConfig;
use crate::params::{extract_file_paths, writes_path};
use std::collections::HashMap;

pub struct SupersedeWrites;

impl Strategy for SupersedeWrites {
    fn name(&self) -> &'static str {
        "supersede_writes"
    }

    fn enabled(&self, config: &DcpConfig) -> bool {
        config.strategies.supersede_writes.enabled
    }

    fn run(&self, ctx: &mut StrategyContext) {
        // Last transcript position each path was read at.
        let mut last_read: HashMap<String, usize> = HashMap::new();
        for (index, call_id) in ctx.state.tool_id_list.iter().enumerate() {
            let Some(entry) = ctx.state.tool_entry(call_id) else {
                continue;
            };
            if entry.tool.to_lowercase() == "read" {
                for path in extract_file_paths(&entry.tool, &entry.parameters) {
                    last_read.insert(path, index);
                }
            }
        }

        let mut marked: Vec<(String, String)> = Vec::new();
        for (index, call_id) in ctx.state.tool_id_list.iter().enumerate() {
            if ctx.state.is_pruned(call_id) {
                continue;
            }
            let Some(entry) = ctx.state.tool_entry(call_id) else {
                continue;
            };
            if ctx.config.is_tool_protected(&entry.tool) {
                continue;
            }

            for path in extract_file_paths(&entry.tool, &entry.parameters) {
                if !writes_path(&entry.tool, &entry.parameters, &path) {
                    continue;
                }
                if ctx.config.is_file_protected(&path) {
                    continue;
                }
                if last_read.get(&path).is_some_and(|&read_at| read_at > index) {
                    marked.push((call_id.clone(), path));
                    break;
                }
            }
        }

        for (call_id, path) in marked {
            let tokens = input_tokens(ctx.messages, &call_id);
            ctx.state.mark_tool_pruned(&call_id);
            ctx.state.record_savings(tokens);
            ctx.reports.push(StrategyReport::Supersede {
                path,
                pruned_id: call_id,
            });
        }
    }
}
