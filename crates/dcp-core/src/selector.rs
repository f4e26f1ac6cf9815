//! Model selection for the background analyser.
//!
//! Candidates are tried in a fixed order: the config override, the
//! model cached from the last chat params, then the model attached to
//! the session's transcript. A capability probe filters unusable
//! candidates; with `strict_model_selection` no fallback happens.

use crate::config::DcpConfig;
use dcp_host::ModelRef;
use tracing::info;

/// Where a selected model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    ConfigOverride,
    ChatParams,
    SessionInfo,
}

/// A negotiated analysis model.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub model: ModelRef,
    pub source: SelectionSource,
    /// True when the first candidate failed and a later one was used.
    pub fallback: bool,
}

/// Parse a `provider/model` override string.
pub fn parse_model_override(value: &str) -> Option<ModelRef> {
    let (provider, model) = value.split_once('/')?;
    if provider.is_empty() || model.is_empty() {
        return None;
    }
    Some(ModelRef::new(provider, model))
}

/// Ordered candidate list for this config/session.
fn candidates(
    config: &DcpConfig,
    chat_model: Option<&ModelRef>,
    session_model: Option<&ModelRef>,
) -> Vec<(SelectionSource, ModelRef)> {
    let mut out = Vec::new();
    if let Some(over) = config.model.as_deref().and_then(parse_model_override) {
        out.push((SelectionSource::ConfigOverride, over));
    }
    if let Some(model) = chat_model {
        out.push((SelectionSource::ChatParams, model.clone()));
    }
    if let Some(model) = session_model {
        out.push((SelectionSource::SessionInfo, model.clone()));
    }
    out
}

/// Pick the analysis model, probing each candidate in order.
///
/// Returns `None` when no candidate passes, or when the preferred
/// candidate fails under `strict_model_selection`.
pub fn select_model(
    config: &DcpConfig,
    chat_model: Option<&ModelRef>,
    session_model: Option<&ModelRef>,
    probe: impl Fn(&ModelRef) -> bool,
) -> Option<ModelSelection> {
    let candidates = candidates(config, chat_model, session_model);

    for (position, (source, model)) in candidates.into_iter().enumerate() {
        if probe(&model) {
            if position > 0 {
                info!(
                    provider = %model.provider_id,
                    model = %model.model_id,
                    "analysis model fell back"
                );
            }
            return Some(ModelSelection {
                model,
                source,
                fallback: position > 0,
            });
        }
        if config.strict_model_selection {
            info!("strict model selection: preferred model unusable, no fallback");
            return None;
        }
    }
    None
}
