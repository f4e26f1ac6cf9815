//! User-facing notifications.
//!
//! Everything here is best-effort: a failed toast or prompt is logged
//! and forgotten. Notifications either go through the toast channel or
//! as an `ignored` synthetic prompt - visible to the user, invisible to
//! the model.

use crate::config::{DcpConfig, NotificationType, PruningSummary};
use crate::strategy::StrategyReport;
use dcp_host::{HostClient, Toast, ToastVariant};
use tracing::error;

/// A distill target as shown to the user.
#[derive(Debug, Clone)]
pub struct DistillNote {
    pub tool: String,
    pub distillation: String,
}

/// What happened, for formatting.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Model called `prune`.
    Pruned { count: usize, tokens: u64 },
    /// Model called `distill`.
    Distilled {
        count: usize,
        tokens: u64,
        notes: Vec<DistillNote>,
    },
    /// Model called `compress`.
    Compressed {
        topic: String,
        messages: usize,
        tools: usize,
        summary: String,
    },
    /// Automatic strategies marked calls this turn.
    Strategies { reports: Vec<StrategyReport> },
}

/// Render a token count like `87`, `1.2k`, `34k`.
pub fn format_tokens(tokens: u64) -> String {
    if tokens < 1_000 {
        tokens.to_string()
    } else if tokens < 10_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        format!("{}k", tokens / 1_000)
    }
}

/// Render a progress bar like `[########------------] 40%`.
pub fn progress_bar(used: u64, limit: u64, width: usize) -> String {
    if limit == 0 {
        return format!("[{}] ?%", "-".repeat(width));
    }
    let ratio = (used as f64 / limit as f64).clamp(0.0, 1.0);
    let filled = (ratio * width as f64).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        ratio * 100.0
    )
}

/// Format a notification at the configured verbosity.
///
/// Returns `None` when the config says to stay quiet.
pub fn format_notification(config: &DcpConfig, notification: &Notification) -> Option<String> {
    if config.pruning_summary == PruningSummary::Off {
        return None;
    }
    let detailed = config.pruning_summary == PruningSummary::Detailed;

    let text = match notification {
        Notification::Pruned { count, tokens } => format!(
            "dcp: pruned {count} tool output{} (~{} tokens saved)",
            plural(*count),
            format_tokens(*tokens)
        ),
        Notification::Distilled { count, tokens, notes } => {
            let mut text = format!(
                "dcp: distilled {count} tool output{} (~{} tokens saved)",
                plural(*count),
                format_tokens(*tokens)
            );
            if config.tools.distill.show_distillation {
                for note in notes {
                    text.push_str(&format!("\n  {} → {}", note.tool, note.distillation));
                }
            }
            text
        }
        Notification::Compressed {
            topic,
            messages,
            tools,
            summary,
        } => {
            let mut text = format!(
                "dcp: compressed \"{topic}\" ({messages} message{}, {tools} tool call{})",
                plural(*messages),
                plural(*tools)
            );
            if config.tools.compress.show_compression {
                text.push_str(&format!("\n  {summary}"));
            }
            text
        }
        Notification::Strategies { reports } => {
            if reports.is_empty() {
                return None;
            }
            if !detailed {
                let total: usize = reports.iter().map(report_count).sum();
                format!("dcp: auto-pruned {total} tool call{}", plural(total))
            } else {
                let mut lines = vec!["dcp: auto-pruned".to_string()];
                for report in reports {
                    lines.push(format!("  {}", format_report(report)));
                }
                lines.join("\n")
            }
        }
    };
    Some(text)
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn report_count(report: &StrategyReport) -> usize {
    match report {
        StrategyReport::Dedup { pruned_ids, .. } => pruned_ids.len(),
        StrategyReport::Supersede { .. } | StrategyReport::PurgeError { .. } => 1,
    }
}

fn format_report(report: &StrategyReport) -> String {
    match report {
        StrategyReport::Dedup {
            tool,
            param_key,
            duplicate_count,
            ..
        } => format!(
            "{tool} ({duplicate_count} duplicate{}): {param_key} ({duplicate_count}× duplicate)",
            plural(*duplicate_count)
        ),
        StrategyReport::Supersede { path, .. } => {
            format!("write superseded by later read: {path}")
        }
        StrategyReport::PurgeError { tool, age_turns, .. } => {
            format!("{tool} error input purged ({age_turns} turns old)")
        }
    }
}

/// Deliver a notification through the configured channel. Best-effort.
pub async fn dispatch(
    host: &dyn HostClient,
    config: &DcpConfig,
    session_id: &str,
    notification: &Notification,
) {
    let Some(text) = format_notification(config, notification) else {
        return;
    };

    let result = match config.prune_notification_type {
        NotificationType::Toast => {
            host.show_toast(Toast::new(text, ToastVariant::Info).with_title("dcp"))
                .await
        }
        NotificationType::Message => host.session_prompt(session_id, &text, true).await,
    };

    if let Err(err) = result {
        error!(%err, "notification delivery failed");
    }
}
