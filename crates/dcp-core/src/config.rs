//! Engine configuration.
//!
//! The config document arrives as JSON from the host's plugin
//! configuration. Every field has a default so that older and newer
//! documents both deserialize cleanly; unknown fields are ignored.

use dcp_util::glob::matches_any;
use serde::{Deserialize, Serialize};

/// Tools that are never prunable regardless of configuration: the
/// pruning tools themselves plus tools whose outputs carry live task
/// state the model must keep.
pub const BUILTIN_PROTECTED_TOOLS: &[&str] = &[
    "prune",
    "distill",
    "compress",
    "task",
    "todowrite",
    "todoread",
    "batch",
];

/// The three model-callable pruning tools.
pub const PRUNING_TOOLS: &[&str] = &["prune", "distill", "compress"];

/// Whether a tool name is one of the engine's own pruning tools.
pub fn is_pruning_tool(tool: &str) -> bool {
    PRUNING_TOOLS.contains(&tool.to_lowercase().as_str())
}

fn default_true() -> bool {
    true
}

fn default_nudge_frequency() -> u32 {
    5
}

fn default_purge_error_turns() -> u64 {
    3
}

/// Notification verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruningSummary {
    Off,
    #[default]
    Minimal,
    Detailed,
}

/// Notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Toast,
    #[default]
    Message,
}

/// Host permission mode for a model-callable tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPermission {
    #[default]
    Allow,
    Ask,
    Deny,
}

/// Per-tool knobs for `prune`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PruneToolConfig {
    pub enabled: bool,
    pub permission: ToolPermission,
}

impl Default for PruneToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permission: ToolPermission::Allow,
        }
    }
}

/// Per-tool knobs for `distill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DistillToolConfig {
    pub enabled: bool,
    pub permission: ToolPermission,
    /// Show the model-authored distillation text in notifications.
    pub show_distillation: bool,
}

impl Default for DistillToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permission: ToolPermission::Allow,
            show_distillation: true,
        }
    }
}

/// Per-tool knobs for `compress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressToolConfig {
    pub enabled: bool,
    pub permission: ToolPermission,
    /// Show the model-authored summary in notifications.
    pub show_compression: bool,
}

impl Default for CompressToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permission: ToolPermission::Allow,
            show_compression: true,
        }
    }
}

/// Shared tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolSettings {
    /// Additional tool names that must never be pruned.
    pub protected_tools: Vec<String>,
    pub nudge_enabled: bool,
    /// Unpruned non-protected tool results before a nudge is injected.
    pub nudge_frequency: u32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            protected_tools: Vec::new(),
            nudge_enabled: true,
            nudge_frequency: default_nudge_frequency(),
        }
    }
}

/// All tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolsConfig {
    pub prune: PruneToolConfig,
    pub distill: DistillToolConfig,
    pub compress: CompressToolConfig,
    pub settings: ToolSettings,
}

/// A strategy on/off switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrategyToggle {
    pub enabled: bool,
}

impl Default for StrategyToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Error-purge strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PurgeErrorsConfig {
    pub enabled: bool,
    /// Minimum age, in turns, before an errored call's input is redacted.
    pub turns: u64,
}

impl Default for PurgeErrorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            turns: default_purge_error_turns(),
        }
    }
}

/// Strategy pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrategiesConfig {
    pub deduplication: StrategyToggle,
    pub supersede_writes: StrategyToggle,
    pub purge_errors: PurgeErrorsConfig,
}

/// Manual-mode behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManualModeConfig {
    pub enabled: bool,
    /// Keep automatic strategies running even in manual mode.
    pub automatic_strategies: bool,
}

/// `/dcp` command registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandsConfig {
    pub enabled: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// The engine configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DcpConfig {
    /// Master switch.
    pub enabled: bool,

    /// Enable file logging.
    pub debug: bool,

    pub pruning_summary: PruningSummary,
    pub prune_notification_type: NotificationType,

    /// Tools touching files matching these globs are never pruned.
    pub protected_file_patterns: Vec<String>,

    pub tools: ToolsConfig,
    pub strategies: StrategiesConfig,
    pub manual_mode: ManualModeConfig,
    pub commands: CommandsConfig,

    /// `provider/model` override for the background analyser.
    pub model: Option<String>,

    /// Fail instead of falling back when the configured model is unusable.
    pub strict_model_selection: bool,

    /// Toast when the background analyser falls back to another model.
    pub show_model_error_toasts: bool,
}

impl Default for DcpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            pruning_summary: PruningSummary::default(),
            prune_notification_type: NotificationType::default(),
            protected_file_patterns: Vec::new(),
            tools: ToolsConfig::default(),
            strategies: StrategiesConfig::default(),
            manual_mode: ManualModeConfig::default(),
            commands: CommandsConfig::default(),
            model: None,
            strict_model_selection: false,
            show_model_error_toasts: default_true(),
        }
    }
}

impl DcpConfig {
    /// Parse a config document, tolerating unknown fields.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Whether a tool name is protected from pruning.
    ///
    /// Comparison is case-insensitive, matching tool-call-id handling.
    pub fn is_tool_protected(&self, tool: &str) -> bool {
        let tool = tool.to_lowercase();
        BUILTIN_PROTECTED_TOOLS.contains(&tool.as_str())
            || self
                .tools
                .settings
                .protected_tools
                .iter()
                .any(|t| t.to_lowercase() == tool)
    }

    /// Whether a file path is covered by the protected globs.
    pub fn is_file_protected(&self, path: &str) -> bool {
        matches_any(path, &self.protected_file_patterns)
    }

    /// Whether any model-callable pruning tool is enabled.
    pub fn any_tool_enabled(&self) -> bool {
        self.tools.prune.enabled || self.tools.distill.enabled || self.tools.compress.enabled
    }

    /// Whether the `<prunable-tools>` manifest applies (prune or distill).
    pub fn manifest_enabled(&self) -> bool {
        self.tools.prune.enabled || self.tools.distill.enabled
    }

    /// Whether automatic strategies run for this session state.
    pub fn strategies_active(&self, manual_mode: bool) -> bool {
        !manual_mode || self.manual_mode.automatic_strategies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = DcpConfig::default();
        assert!(config.enabled);
        assert!(!config.debug);
        assert_eq!(config.pruning_summary, PruningSummary::Minimal);
        assert_eq!(config.prune_notification_type, NotificationType::Message);
        assert!(config.tools.prune.enabled);
        assert_eq!(config.tools.settings.nudge_frequency, 5);
        assert_eq!(config.strategies.purge_errors.turns, 3);
        assert!(!config.manual_mode.enabled);
        assert!(config.commands.enabled);
    }

    #[test]
    fn test_partial_document() {
        let config = DcpConfig::from_value(&json!({
            "pruningSummary": "detailed",
            "tools": {"distill": {"enabled": false}},
            "strategies": {"purgeErrors": {"turns": 7}}
        }));
        assert_eq!(config.pruning_summary, PruningSummary::Detailed);
        assert!(!config.tools.distill.enabled);
        assert!(config.tools.prune.enabled);
        assert_eq!(config.strategies.purge_errors.turns, 7);
        // Untouched sections keep defaults.
        assert!(config.strategies.deduplication.enabled);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config = DcpConfig::from_value(&json!({"futureKnob": 12, "enabled": false}));
        assert!(!config.enabled);
    }

    #[test]
    fn test_protected_tools() {
        let mut config = DcpConfig::default();
        assert!(config.is_tool_protected("prune"));
        assert!(config.is_tool_protected("TASK"));
        assert!(!config.is_tool_protected("read"));

        config.tools.settings.protected_tools.push("WebFetch".into());
        assert!(config.is_tool_protected("webfetch"));
    }

    #[test]
    fn test_protected_files() {
        let mut config = DcpConfig::default();
        assert!(!config.is_file_protected(".env"));
        config.protected_file_patterns.push("**/.env*".into());
        assert!(config.is_file_protected(".env"));
        assert!(config.is_file_protected("app/.env.local"));
    }

    #[test]
    fn test_manifest_enabled() {
        let mut config = DcpConfig::default();
        assert!(config.manifest_enabled());
        config.tools.prune.enabled = false;
        config.tools.distill.enabled = false;
        assert!(!config.manifest_enabled());
        assert!(config.any_tool_enabled()); // compress still on
    }

    #[test]
    fn test_strategies_active() {
        let mut config = DcpConfig::default();
        assert!(config.strategies_active(false));
        assert!(!config.strategies_active(true));
        config.manual_mode.automatic_strategies = true;
        assert!(config.strategies_active(true));
    }
}
