//! Prompt templates and the conditional renderer.
//!
//! Templates carry `<prune>…</prune>`-style blocks that are kept or
//! dropped depending on which tools are enabled, `// … //` comments that
//! are always stripped, and blank runs that collapse after removal. The
//! rendered strings are model-visible contracts; wording changes are
//! breaking.

use crate::config::DcpConfig;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `<toolName>…</toolName>` conditional blocks.
static TOOL_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(prune|distill|compress)>\n?(.*?)</(prune|distill|compress)>\n?")
        .expect("tool block regex is a compile-time constant")
});

/// `// … //` template comments.
static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*//.*//[ \t]*\n?").expect("comment regex is a compile-time constant"));

/// Runs of blank lines left behind by removed blocks.
static BLANK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank regex is a compile-time constant"));

/// Render a template against the enabled-tool set.
pub fn render(template: &str, config: &DcpConfig) -> String {
    let kept = TOOL_BLOCK_RE.replace_all(template, |caps: &Captures| {
        let open = &caps[1];
        let close = &caps[3];
        if open != close {
            // Mismatched tags are left alone rather than eaten.
            return caps[0].to_string();
        }
        let enabled = match open {
            "prune" => config.tools.prune.enabled,
            "distill" => config.tools.distill.enabled,
            "compress" => config.tools.compress.enabled,
            _ => false,
        };
        if enabled {
            caps[2].to_string()
        } else {
            String::new()
        }
    });

    let stripped = COMMENT_RE.replace_all(&kept, "");
    BLANK_RE.replace_all(&stripped, "\n\n").trim().to_string()
}

/// System prompt appended via the system transform hook.
pub const SYSTEM_PROMPT: &str = "\
## Context Management

// rendered per enabled tool set //
Your conversation context is actively managed. Tool outputs that are no \
longer needed can be removed to keep the context small.

Each turn you may receive a `<prunable-tools>` list mapping small numeric \
indices to previous tool calls. Reference tool calls by those indices.

<prune>
- Use the `prune` tool to discard tool outputs that are pure noise: \
superseded reads, old directory listings, exploratory searches that led \
nowhere.
</prune>
<distill>
- Use the `distill` tool when an output still contains a few load-bearing \
facts: record what you need to keep, and the rest is discarded.
</distill>
<compress>
- Use the `compress` tool after finishing a phase of work: replace the \
whole range of messages with a dense summary you author.
</compress>

Never reference a tool call that is not listed in `<prunable-tools>`. \
Context management is housekeeping; it is never a substitute for doing \
the task.";

/// Description of the `prune` tool.
pub const PRUNE_DESCRIPTION: &str = "\
Remove tool outputs that are no longer needed from the conversation \
context.

Provide the numeric indices from the `<prunable-tools>` list, as strings. \
The referenced outputs are replaced with a placeholder; their inputs stay \
visible. Prune outputs you have fully absorbed or that later work has \
made irrelevant. Do not prune outputs you may still need to quote.";

/// Description of the `distill` tool.
pub const DISTILL_DESCRIPTION: &str = "\
Replace tool outputs with the facts worth keeping.

Provide `targets`, an array of `{id, distillation}` objects where `id` is \
a numeric index from `<prunable-tools>` and `distillation` is the \
knowledge to preserve from that output. The output itself is discarded; \
your distillation is shown to the user as the record of what was kept.";

/// Description of the `compress` tool.
pub const COMPRESS_DESCRIPTION: &str = "\
Compress a completed range of the conversation into a summary you write.

Provide `topic`, and `content` with `startString` and `endString` - two \
verbatim substrings that each occur exactly once in the conversation and \
bracket the range - plus `summary`, the replacement text. Everything \
between the two matches is collapsed; the summary must carry every fact, \
decision, and file path from the range that later work could need.";

/// Nudge appended when unpruned results accumulate.
pub const NUDGE_TEMPLATE: &str = "\
<context-nudge>
{count} tool results have accumulated since the last cleanup.
<prune>
Consider pruning entries from <prunable-tools> that you no longer need.
</prune>
<distill>
Consider distilling outputs whose key facts you want to keep.
</distill>
<compress>
If a phase of work is finished, consider compressing it into a summary.
</compress>
</context-nudge>";

/// Render the nudge for the current counter value.
pub fn render_nudge(config: &DcpConfig, count: u32) -> String {
    render(NUDGE_TEMPLATE, config).replace("{count}", &count.to_string())
}
