//! Per-session engine state.
//!
//! One [`SessionState`] exists per host session. The tool cache is a
//! bounded FIFO keyed by lowercase tool-call-id; the prune sets and
//! compress summaries are the engine's durable output and round-trip
//! through the persisted sidecar.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};

/// Maximum number of cached tool invocations per session.
pub const TOOL_CACHE_CAPACITY: usize = 500;

/// Cached metadata for one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCacheEntry {
    pub tool: String,
    pub parameters: Value,
    pub status: String,
    pub error: Option<String>,
    /// Turn on which the call settled.
    pub turn: u64,
    /// Set when a host compaction has already consumed this call.
    pub compacted: bool,
}

/// Prune sets: which outputs/inputs get redacted, which messages are
/// considered compacted away by a range compression.
#[derive(Debug, Clone, Default)]
pub struct PruneState {
    /// Lowercase tool-call-ids scheduled for redaction.
    pub tool_ids: HashSet<String>,
    /// Message ids covered by a compress range.
    pub message_ids: HashSet<String>,
}

/// A model-authored replacement for a compressed message range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressSummary {
    /// First message of the compressed range.
    pub anchor_message_id: String,
    pub summary: String,
}

/// Token-savings accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Tokens saved since the last notification.
    pub prune_token_counter: u64,
    /// Tokens saved since session start.
    pub total_prune_tokens: u64,
}

/// A `/dcp prune|distill|compress [focus]` request waiting to be spliced
/// into the next user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualTrigger {
    pub session_id: String,
    pub prompt: String,
}

/// The sidecar document persisted per session id.
///
/// Missing fields default so older sidecars load cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub prune: PersistedPrune,
    pub compress_summaries: Vec<CompressSummary>,
    pub stats: Stats,
}

/// Persisted prune sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedPrune {
    pub tool_ids: Vec<String>,
    pub message_ids: Vec<String>,
}

/// All engine state for one session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Opaque session id, or `None` until first bind.
    pub session_id: Option<String>,

    /// Sub-agent sessions are inert: no injection, no strategies, no tools.
    pub is_sub_agent: bool,

    /// Tool cache keyed by lowercase call id.
    tool_parameters: HashMap<String, ToolCacheEntry>,

    /// Insertion order of cache keys, for FIFO eviction.
    insertion_order: VecDeque<String>,

    /// Live tool-call-ids in transcript order; the index→id dictionary
    /// the model addresses in `<prunable-tools>`.
    pub tool_id_list: Vec<String>,

    pub prune: PruneState,

    /// Ordered compress summaries, oldest first.
    pub compress_summaries: Vec<CompressSummary>,

    pub stats: Stats,

    /// New non-protected tool results since the last successful prune.
    pub nudge_counter: u32,

    /// True iff the most recently settled tool was a pruning tool.
    pub last_tool_prune: bool,

    /// Timestamp (ms) of the most recent host compaction handled.
    pub last_compaction: i64,

    /// Count of assistant step-start markers observed.
    pub current_turn: u64,

    /// Last observed model variant, for synthetic-message emission.
    pub variant: Option<String>,

    /// Last observed model, for provider-sensitive injection and the
    /// background analyser.
    pub model: Option<dcp_host::ModelRef>,

    /// Last observed model context window, in tokens.
    pub model_context_limit: Option<u64>,

    /// When set, automatic strategies are disabled and the user drives
    /// pruning via `/dcp` commands.
    pub manual_mode: bool,

    pub pending_manual_trigger: Option<ManualTrigger>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset everything except the bound session id and manual mode flag.
    pub fn reset(&mut self) {
        let session_id = self.session_id.take();
        let manual_mode = self.manual_mode;
        *self = Self::new();
        self.session_id = session_id;
        self.manual_mode = manual_mode;
    }

    /// Clear caches after a detected host compaction.
    pub fn apply_compaction(&mut self, timestamp: i64) {
        self.tool_parameters.clear();
        self.insertion_order.clear();
        self.prune.tool_ids.clear();
        self.prune.message_ids.clear();
        self.compress_summaries.clear();
        self.nudge_counter = 0;
        self.last_tool_prune = false;
        self.last_compaction = timestamp;
    }

    /// Number of cached tool invocations.
    pub fn cached_tool_count(&self) -> usize {
        self.tool_parameters.len()
    }

    /// Look up a cached entry by call id (case-insensitive).
    pub fn tool_entry(&self, call_id: &str) -> Option<&ToolCacheEntry> {
        self.tool_parameters.get(&call_id.to_lowercase())
    }

    /// Mutable lookup by call id (case-insensitive).
    pub fn tool_entry_mut(&mut self, call_id: &str) -> Option<&mut ToolCacheEntry> {
        self.tool_parameters.get_mut(&call_id.to_lowercase())
    }

    /// Whether a call id is cached.
    pub fn has_tool(&self, call_id: &str) -> bool {
        self.tool_parameters.contains_key(&call_id.to_lowercase())
    }

    /// Insert a cache entry, evicting FIFO past capacity.
    ///
    /// Entries referenced by the prune set survive eviction so that
    /// redaction keeps working for them.
    pub fn cache_tool(&mut self, call_id: &str, entry: ToolCacheEntry) {
        let key = call_id.to_lowercase();
        if self.tool_parameters.insert(key.clone(), entry).is_none() {
            self.insertion_order.push_back(key);
        }

        while self.tool_parameters.len() > TOOL_CACHE_CAPACITY {
            let Some(pos) = self
                .insertion_order
                .iter()
                .position(|id| !self.prune.tool_ids.contains(id))
            else {
                break;
            };
            if let Some(evicted) = self.insertion_order.remove(pos) {
                self.tool_parameters.remove(&evicted);
            }
        }
    }

    /// Whether a call id is scheduled for redaction (case-insensitive).
    pub fn is_pruned(&self, call_id: &str) -> bool {
        self.prune.tool_ids.contains(&call_id.to_lowercase())
    }

    /// Schedule a call id for redaction.
    pub fn mark_tool_pruned(&mut self, call_id: &str) {
        self.prune.tool_ids.insert(call_id.to_lowercase());
    }

    /// Resolve a manifest index to the live call id.
    pub fn tool_id_at(&self, index: usize) -> Option<&str> {
        self.tool_id_list.get(index).map(String::as_str)
    }

    /// Add saved tokens to both counters.
    pub fn record_savings(&mut self, tokens: u64) {
        self.stats.prune_token_counter += tokens;
        self.stats.total_prune_tokens += tokens;
    }

    /// Snapshot the durable part of this state for the sidecar.
    pub fn persisted(&self) -> PersistedState {
        let mut tool_ids: Vec<String> = self.prune.tool_ids.iter().cloned().collect();
        tool_ids.sort();
        let mut message_ids: Vec<String> = self.prune.message_ids.iter().cloned().collect();
        message_ids.sort();
        PersistedState {
            prune: PersistedPrune {
                tool_ids,
                message_ids,
            },
            compress_summaries: self.compress_summaries.clone(),
            stats: self.stats,
        }
    }

    /// Restore the durable part of this state from a sidecar.
    pub fn restore(&mut self, persisted: PersistedState) {
        self.prune.tool_ids = persisted
            .prune
            .tool_ids
            .into_iter()
            .map(|id| id.to_lowercase())
            .collect();
        self.prune.message_ids = persisted.prune.message_ids.into_iter().collect();
        self.compress_summaries = persisted.compress_summaries;
        self.stats = persisted.stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(tool: &str) -> ToolCacheEntry {
        ToolCacheEntry {
            tool: tool.into(),
            parameters: json!({}),
            status: "completed".into(),
            error: None,
            turn: 1,
            compacted: false,
        }
    }

    #[test]
    fn test_case_insensitive_cache() {
        let mut state = SessionState::new();
        state.cache_tool("Call_ABC", entry("read"));
        assert!(state.has_tool("call_abc"));
        assert!(state.has_tool("CALL_ABC"));
        assert_eq!(state.cached_tool_count(), 1);

        // Re-caching the same id under different case does not duplicate.
        state.cache_tool("call_abc", entry("read"));
        assert_eq!(state.cached_tool_count(), 1);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut state = SessionState::new();
        for i in 0..TOOL_CACHE_CAPACITY + 10 {
            state.cache_tool(&format!("call_{i}"), entry("read"));
        }
        assert_eq!(state.cached_tool_count(), TOOL_CACHE_CAPACITY);
        assert!(!state.has_tool("call_0"));
        assert!(state.has_tool(&format!("call_{}", TOOL_CACHE_CAPACITY + 9)));
    }

    #[test]
    fn test_eviction_skips_pruned_entries() {
        let mut state = SessionState::new();
        state.cache_tool("call_keep", entry("read"));
        state.mark_tool_pruned("call_keep");
        for i in 0..TOOL_CACHE_CAPACITY + 5 {
            state.cache_tool(&format!("call_{i}"), entry("read"));
        }
        assert!(state.has_tool("call_keep"));
        assert_eq!(state.cached_tool_count(), TOOL_CACHE_CAPACITY);
    }

    #[test]
    fn test_compaction_clears() {
        let mut state = SessionState::new();
        state.cache_tool("call_a", entry("read"));
        state.mark_tool_pruned("call_a");
        state.prune.message_ids.insert("msg_1".into());
        state.compress_summaries.push(CompressSummary {
            anchor_message_id: "msg_1".into(),
            summary: "old".into(),
        });
        state.nudge_counter = 4;
        state.last_tool_prune = true;

        state.apply_compaction(1_000);

        assert_eq!(state.cached_tool_count(), 0);
        assert!(state.prune.tool_ids.is_empty());
        assert!(state.prune.message_ids.is_empty());
        assert!(state.compress_summaries.is_empty());
        assert_eq!(state.nudge_counter, 0);
        assert!(!state.last_tool_prune);
        assert_eq!(state.last_compaction, 1_000);
    }

    #[test]
    fn test_persist_roundtrip() {
        let mut state = SessionState::new();
        state.mark_tool_pruned("Call_A");
        state.prune.message_ids.insert("msg_1".into());
        state.compress_summaries.push(CompressSummary {
            anchor_message_id: "msg_1".into(),
            summary: "phase a".into(),
        });
        state.record_savings(120);

        let persisted = state.persisted();
        let json = serde_json::to_string(&persisted).unwrap();
        let loaded: PersistedState = serde_json::from_str(&json).unwrap();

        let mut restored = SessionState::new();
        restored.restore(loaded);
        assert!(restored.is_pruned("call_a"));
        assert!(restored.prune.message_ids.contains("msg_1"));
        assert_eq!(restored.compress_summaries, state.compress_summaries);
        assert_eq!(restored.stats.total_prune_tokens, 120);
    }

    #[test]
    fn test_sidecar_missing_fields_default() {
        let loaded: PersistedState = serde_json::from_str("{}").unwrap();
        assert!(loaded.prune.tool_ids.is_empty());
        assert_eq!(loaded.stats.total_prune_tokens, 0);
    }

    #[test]
    fn test_reset_keeps_manual_mode() {
        let mut state = SessionState::new();
        state.session_id = Some("ses_1".into());
        state.manual_mode = true;
        state.nudge_counter = 3;
        state.reset();
        assert_eq!(state.session_id.as_deref(), Some("ses_1"));
        assert!(state.manual_mode);
        assert_eq!(state.nudge_counter, 0);
    }
}
