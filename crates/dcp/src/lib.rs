//! Dynamic context pruning plugin.
//!
//! This crate wires the engine to a concrete host: sidecar storage under
//! the dcp data directory, the host RPC client, and the three
//! model-callable tools ready for registration.

use anyhow::Context;
use dcp_core::tools::{CompressTool, DistillTool, PruneTool, Tool};
use dcp_core::{DcpConfig, Engine};
use dcp_host::HostClient;
use dcp_storage::JsonStorage;
use std::sync::Arc;
use tracing::info;

pub use dcp_core::{EngineError, EngineResult};
pub use dcp_host::{ChatMessageInput, CommandExecuteInput, HostEvent, MessageWithParts};

/// The installed plugin: one engine plus its registered tools.
pub struct DcpPlugin {
    engine: Arc<Engine>,
    tools: Vec<Arc<dyn Tool>>,
}

impl DcpPlugin {
    /// Build the plugin from the host's plugin-config document.
    pub fn new(config: &serde_json::Value, host: Arc<dyn HostClient>) -> anyhow::Result<Self> {
        let config = DcpConfig::from_value(config);

        if config.debug {
            dcp_util::log::init(dcp_util::log::LogConfig {
                print: false,
                level: dcp_util::log::LogLevel::Debug,
                file: dcp_util::log::default_log_path(),
            });
        }

        let sidecar_dir = dcp_util::path::data_dir()
            .context("no data directory available for session sidecars")?
            .join("sessions");
        let storage = Arc::new(JsonStorage::new(sidecar_dir));

        Self::with_storage(config, storage, host)
    }

    /// Build the plugin with explicit storage (used by tests and hosts
    /// that manage their own data directory).
    pub fn with_storage(
        config: DcpConfig,
        storage: Arc<dyn dcp_storage::Storage>,
        host: Arc<dyn HostClient>,
    ) -> anyhow::Result<Self> {
        let enabled = config.enabled;
        let engine = Arc::new(Engine::new(config, storage, host));

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        if engine.config().tools.prune.enabled {
            tools.push(Arc::new(PruneTool::new(engine.clone())));
        }
        if engine.config().tools.distill.enabled {
            tools.push(Arc::new(DistillTool::new(engine.clone())));
        }
        if engine.config().tools.compress.enabled {
            tools.push(Arc::new(CompressTool::new(engine.clone())));
        }

        info!(enabled, tools = tools.len(), "dcp plugin initialized");
        Ok(Self { engine, tools })
    }

    /// The engine, for hook wiring.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// The enabled model-callable tools, for host registration.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// `config` hook: register the `/dcp` command and promote the
    /// enabled tools into the host's primary-tool list.
    pub fn register_host_config(&self, host_config: &mut serde_json::Value) {
        let config = self.engine.config();

        if config.commands.enabled {
            host_config["command"]["dcp"] = serde_json::json!({
                "description": "Dynamic context pruning",
            });
        }

        let primary = host_config["experimental"]["primaryTools"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let mut primary: Vec<serde_json::Value> = primary;
        for tool in &self.tools {
            let name = serde_json::Value::String(tool.id().to_string());
            if !primary.contains(&name) {
                primary.push(name);
            }
        }
        host_config["experimental"]["primaryTools"] = serde_json::Value::Array(primary);

        for (id, permission) in [
            ("prune", config.tools.prune.permission),
            ("distill", config.tools.distill.permission),
            ("compress", config.tools.compress.permission),
        ] {
            if self.tools.iter().any(|t| t.id() == id) {
                host_config["permission"][id] =
                    serde_json::to_value(permission).unwrap_or_default();
            }
        }
    }
}
