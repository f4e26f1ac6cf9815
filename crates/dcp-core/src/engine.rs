//! The engine: hook entry points and per-session orchestration.
//!
//! One [`Engine`] exists per host process. Each session gets its own
//! state behind its own lock, so concurrent sessions proceed
//! independently; the host guarantees that transforms and tool
//! executions for a single session never interleave.

use crate::config::DcpConfig;
use crate::injector;
use crate::notify::{self, Notification};
use crate::prompt;
use crate::rewriter::{self, synthetic_message};
use crate::selector;
use crate::session::{self, SessionCheck};
use crate::state::{PersistedState, SessionState};
use crate::strategy;
use dcp_host::{ChatMessageInput, HostClient, HostEvent, MessageWithParts, Role, SessionStatus};
use dcp_storage::Storage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// System prompts that identify the host's internal utility agents;
/// those sessions never get context-management instructions.
const INTERNAL_AGENT_SIGNATURES: &[&str] = &[
    "You are a title generator",
    "You are a summarizer",
    "You are a commit message generator",
];

/// The dcp engine.
pub struct Engine {
    pub(crate) config: DcpConfig,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) host: Arc<dyn HostClient>,
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl Engine {
    pub fn new(config: DcpConfig, storage: Arc<dyn Storage>, host: Arc<dyn HostClient>) -> Self {
        Self {
            config,
            storage,
            host,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DcpConfig {
        &self.config
    }

    /// Get or create the state handle for a session id.
    async fn session_handle(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return handle.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::new())))
            .clone()
    }

    /// Get the state handle, lazily binding the session on first touch:
    /// the persisted sidecar is loaded and the sub-agent flag resolved.
    pub async fn ensure_initialized(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        let handle = self.session_handle(session_id).await;
        {
            let mut state = handle.lock().await;
            if state.session_id.is_none() {
                state.session_id = Some(session_id.to_string());
                state.manual_mode = self.config.manual_mode.enabled;
                self.load_sidecar(&mut state, session_id).await;
                self.resolve_sub_agent(&mut state, session_id).await;
            }
        }
        handle
    }

    async fn load_sidecar(&self, state: &mut SessionState, session_id: &str) {
        match self.storage.read::<PersistedState>(session_id).await {
            Ok(Some(persisted)) => {
                debug!(session_id, "restored sidecar");
                state.restore(persisted);
            }
            Ok(None) => {}
            Err(err) => warn!(session_id, %err, "sidecar load failed, starting fresh"),
        }
    }

    async fn resolve_sub_agent(&self, state: &mut SessionState, session_id: &str) {
        match self.host.session_get(session_id).await {
            Ok(session) => state.is_sub_agent = session.is_sub_agent(),
            Err(err) => warn!(session_id, %err, "session lookup failed"),
        }
    }

    /// Persist the durable state. Best-effort: the in-memory state stays
    /// authoritative whatever happens on disk.
    pub(crate) async fn persist(&self, state: &SessionState) {
        let Some(session_id) = state.session_id.as_deref() else {
            return;
        };
        if let Err(err) = self.storage.write(session_id, &state.persisted()).await {
            warn!(session_id, %err, "sidecar write failed");
        }
    }

    /// `chat.message` hook: observe model metadata for later synthetic
    /// message emission and model selection.
    pub async fn on_chat_message(&self, input: &ChatMessageInput) {
        let handle = self.session_handle(&input.session_id).await;
        let mut state = handle.lock().await;
        if input.variant.is_some() {
            state.variant = input.variant.clone();
        }
        if input.model.is_some() {
            state.model = input.model.clone();
        }
        if input.model_context_limit.is_some() {
            state.model_context_limit = input.model_context_limit;
        }
    }

    /// `chat.system.transform` hook: the rendered system prompt to
    /// append, or `None` for internal agents and disabled configs.
    pub fn on_system_transform(&self, existing_system: &[String]) -> Option<String> {
        if !self.config.enabled || !self.config.any_tool_enabled() {
            return None;
        }
        let internal = existing_system.iter().any(|s| {
            INTERNAL_AGENT_SIGNATURES
                .iter()
                .any(|signature| s.starts_with(signature))
        });
        if internal {
            return None;
        }
        Some(prompt::render(prompt::SYSTEM_PROMPT, &self.config))
    }

    /// `chat.messages.transform` hook: the main entry point. Mutates the
    /// outgoing transcript in place.
    pub async fn on_messages_transform(&self, messages: &mut Vec<MessageWithParts>) {
        if !self.config.enabled {
            return;
        }
        let Some(session_id) = session::authoritative_session_id(messages).map(String::from)
        else {
            return;
        };

        let handle = self.ensure_initialized(&session_id).await;
        let mut state = handle.lock().await;
        if state.is_sub_agent {
            return;
        }

        if let SessionCheck::Changed { .. } = session::check_session(&mut state, messages) {
            self.load_sidecar(&mut state, &session_id).await;
            self.resolve_sub_agent(&mut state, &session_id).await;
            if state.is_sub_agent {
                return;
            }
        }

        session::detect_compaction(&mut state, messages);
        session::sync_tool_cache(&mut state, messages, &self.config);
        session::rebuild_tool_id_list(&mut state, messages);

        if self.config.strategies_active(state.manual_mode) {
            let reports = strategy::run_pipeline(&mut state, &self.config, messages);
            if !reports.is_empty() {
                notify::dispatch(
                    self.host.as_ref(),
                    &self.config,
                    &session_id,
                    &Notification::Strategies { reports },
                )
                .await;
                self.persist(&state).await;
            }
        }

        rewriter::apply_redactions(&state, messages);
        rewriter::apply_compress_summaries(&state, messages);

        self.splice_manual_trigger(&mut state, &session_id, messages);

        injector::inject(&state, &self.config, messages);
    }

    /// Append a queued `/dcp prune|distill|compress [focus]` request as a
    /// synthetic user message.
    fn splice_manual_trigger(
        &self,
        state: &mut SessionState,
        session_id: &str,
        messages: &mut Vec<MessageWithParts>,
    ) {
        let Some(trigger) = state.pending_manual_trigger.take() else {
            return;
        };
        if trigger.session_id != session_id {
            state.pending_manual_trigger = Some(trigger);
            return;
        }
        if let Some(template) = rewriter::last_real_user(messages).cloned() {
            messages.push(synthetic_message(
                Role::User,
                "manual-trigger",
                &template,
                trigger.prompt,
            ));
        }
    }

    /// `event` hook: idle sessions get a background analysis pass.
    pub async fn on_event(&self, event: &HostEvent) {
        let HostEvent::SessionStatus { session_id, status } = event else {
            return;
        };
        if *status != SessionStatus::Idle || !self.config.enabled {
            return;
        }

        let handle = self.ensure_initialized(session_id).await;
        let mut state = handle.lock().await;
        if state.is_sub_agent || !self.config.strategies_active(state.manual_mode) {
            return;
        }

        let selection = selector::select_model(&self.config, state.model.as_ref(), None, |_| true);
        match &selection {
            Some(selection) => {
                debug!(
                    session_id,
                    provider = %selection.model.provider_id,
                    model = %selection.model.model_id,
                    "idle analysis model negotiated"
                );
                if selection.fallback && self.config.show_model_error_toasts {
                    let _ = self
                        .host
                        .show_toast(
                            dcp_host::Toast::new(
                                format!(
                                    "falling back to {}/{} for idle analysis",
                                    selection.model.provider_id, selection.model.model_id
                                ),
                                dcp_host::ToastVariant::Warning,
                            )
                            .with_title("dcp"),
                        )
                        .await;
                }
            }
            None => debug!(session_id, "no analysis model available"),
        }

        let messages = match self.host.session_messages(session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(session_id, %err, "idle analysis skipped, transcript fetch failed");
                return;
            }
        };

        session::detect_compaction(&mut state, &messages);
        session::sync_tool_cache(&mut state, &messages, &self.config);
        session::rebuild_tool_id_list(&mut state, &messages);

        let reports = strategy::run_pipeline(&mut state, &self.config, &messages);
        if !reports.is_empty() {
            info!(session_id, marked = reports.len(), "idle analysis marked tool calls");
            notify::dispatch(
                self.host.as_ref(),
                &self.config,
                session_id,
                &Notification::Strategies { reports },
            )
            .await;
            self.persist(&state).await;
        }
    }
}
