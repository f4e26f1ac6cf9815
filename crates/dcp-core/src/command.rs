//! The `/dcp` command family.
//!
//! Commands write their output through `session.prompt` as ignored text
//! and then signal completion by returning a sentinel error, telling the
//! host that no further command handling is needed.

use crate::engine::Engine;
use crate::error::{sentinel, EngineError, EngineResult};
use crate::notify::{self, format_tokens, progress_bar, Notification};
use crate::state::ManualTrigger;
use crate::tools::message_tokens;
use dcp_host::CommandExecuteInput;
use tracing::error;

const HELP_TEXT: &str = "\
dcp - dynamic context pruning

  /dcp context          show context usage and savings
  /dcp stats            show token savings statistics
  /dcp sweep [n]        prune the oldest n eligible tool outputs (default: all)
  /dcp manual [on|off]  toggle manual mode (disables automatic strategies)
  /dcp prune [focus]    ask the model to prune on your next message
  /dcp distill [focus]  ask the model to distill on your next message
  /dcp compress [focus] ask the model to compress on your next message";

impl Engine {
    /// `command.execute.before` hook. Returns `Ok(())` when the command
    /// is not ours; otherwise handles it and returns the sentinel.
    pub async fn on_command(&self, input: &CommandExecuteInput) -> EngineResult<()> {
        if input.command != "dcp" || !self.config.commands.enabled {
            return Ok(());
        }

        let mut words = input.arguments.split_whitespace();
        let sub = words.next().unwrap_or("");
        let rest = words.collect::<Vec<_>>().join(" ");

        match sub {
            "context" => self.cmd_context(&input.session_id).await,
            "stats" => self.cmd_stats(&input.session_id).await,
            "sweep" => self.cmd_sweep(&input.session_id, rest.trim().parse().ok()).await,
            "manual" => self.cmd_manual(&input.session_id, rest.trim()).await,
            "prune" | "distill" | "compress" => {
                self.cmd_trigger(&input.session_id, sub, rest.trim()).await
            }
            _ => {
                self.reply(&input.session_id, HELP_TEXT).await;
                Err(EngineError::CommandHandled(sentinel::HELP))
            }
        }
    }

    /// Best-effort reply on the notification channel.
    async fn reply(&self, session_id: &str, text: &str) {
        if let Err(err) = self.host.session_prompt(session_id, text, true).await {
            error!(session_id, %err, "command reply failed");
        }
    }

    async fn cmd_context(&self, session_id: &str) -> EngineResult<()> {
        let handle = self.ensure_initialized(session_id).await;
        let state = handle.lock().await;

        let messages = self.host.session_messages(session_id).await.unwrap_or_default();
        let used: u64 = messages.iter().map(message_tokens).sum();
        let compacted = messages
            .iter()
            .filter(|m| state.prune.message_ids.contains(&m.info.id))
            .count();
        let limit = state.model_context_limit.unwrap_or(0);

        let mut text = String::from("dcp context\n");
        if limit > 0 {
            text.push_str(&format!(
                "{} of {} tokens\n",
                progress_bar(used, limit, 20),
                format_tokens(limit)
            ));
        } else {
            text.push_str(&format!("~{} tokens in conversation\n", format_tokens(used)));
        }
        text.push_str(&format!(
            "Messages: {} ({} compacted)\nTracked tool calls: {} ({} pruned)\nSaved this session: ~{} tokens",
            messages.len(),
            compacted,
            state.tool_id_list.len(),
            state.prune.tool_ids.len(),
            format_tokens(state.stats.total_prune_tokens)
        ));

        self.reply(session_id, &text).await;
        Err(EngineError::CommandHandled(sentinel::CONTEXT))
    }

    async fn cmd_stats(&self, session_id: &str) -> EngineResult<()> {
        let handle = self.ensure_initialized(session_id).await;
        let state = handle.lock().await;

        let text = format!(
            "dcp stats\nTokens saved this session: ~{}\nSince last notification: ~{}\nPruned tool calls: {}\nCompress summaries: {}\nManual mode: {}",
            format_tokens(state.stats.total_prune_tokens),
            format_tokens(state.stats.prune_token_counter),
            state.prune.tool_ids.len(),
            state.compress_summaries.len(),
            if state.manual_mode { "on" } else { "off" }
        );

        self.reply(session_id, &text).await;
        Err(EngineError::CommandHandled(sentinel::STATS))
    }

    async fn cmd_sweep(&self, session_id: &str, count: Option<usize>) -> EngineResult<()> {
        let handle = self.ensure_initialized(session_id).await;
        let mut state = handle.lock().await;

        let messages = self.host.session_messages(session_id).await.unwrap_or_default();
        crate::session::sync_tool_cache(&mut state, &messages, &self.config);
        crate::session::rebuild_tool_id_list(&mut state, &messages);

        let mut eligible: Vec<String> = Vec::new();
        for call_id in &state.tool_id_list {
            let Some(entry) = state.tool_entry(call_id) else {
                continue;
            };
            if state.is_pruned(call_id)
                || self.config.is_tool_protected(&entry.tool)
                || crate::params::extract_file_paths(&entry.tool, &entry.parameters)
                    .iter()
                    .any(|p| self.config.is_file_protected(p))
            {
                continue;
            }
            eligible.push(call_id.clone());
        }
        if let Some(count) = count {
            eligible.truncate(count);
        }

        let mut tokens = 0u64;
        for call_id in &eligible {
            tokens += crate::strategy::output_tokens(&messages, call_id);
            state.mark_tool_pruned(call_id);
        }
        state.record_savings(tokens);

        if !eligible.is_empty() {
            notify::dispatch(
                self.host.as_ref(),
                &self.config,
                session_id,
                &Notification::Pruned {
                    count: eligible.len(),
                    tokens,
                },
            )
            .await;
            self.persist(&state).await;
        }

        self.reply(
            session_id,
            &format!(
                "dcp: swept {} tool output(s) (~{} tokens)",
                eligible.len(),
                format_tokens(tokens)
            ),
        )
        .await;
        Err(EngineError::CommandHandled(sentinel::SWEEP))
    }

    async fn cmd_manual(&self, session_id: &str, arg: &str) -> EngineResult<()> {
        let handle = self.ensure_initialized(session_id).await;
        let mut state = handle.lock().await;

        state.manual_mode = match arg {
            "on" => true,
            "off" => false,
            _ => !state.manual_mode,
        };
        let text = format!(
            "dcp: manual mode {}",
            if state.manual_mode { "on" } else { "off" }
        );
        drop(state);

        self.reply(session_id, &text).await;
        Err(EngineError::CommandHandled(sentinel::MANUAL))
    }

    async fn cmd_trigger(&self, session_id: &str, tool: &str, focus: &str) -> EngineResult<()> {
        let handle = self.ensure_initialized(session_id).await;
        let mut state = handle.lock().await;

        let mut prompt = match tool {
            "prune" => "Review <prunable-tools> and use the prune tool to remove outputs \
                        that are no longer needed."
                .to_string(),
            "distill" => "Review <prunable-tools> and use the distill tool to replace \
                          outputs with the facts worth keeping."
                .to_string(),
            _ => "Identify a completed phase of this conversation and use the compress \
                  tool to replace it with a summary."
                .to_string(),
        };
        if !focus.is_empty() {
            prompt.push_str(&format!(" Focus on: {focus}."));
        }
        prompt.push_str(" Then continue with the task.");

        state.pending_manual_trigger = Some(ManualTrigger {
            session_id: session_id.to_string(),
            prompt,
        });
        drop(state);

        self.reply(
            session_id,
            &format!("dcp: queued a {tool} pass for your next message"),
        )
        .await;
        Err(EngineError::CommandHandled(sentinel::TRIGGER))
    }
}
