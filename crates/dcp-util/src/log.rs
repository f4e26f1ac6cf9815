//! Logging setup using tracing.
//!
//! The engine runs inside a host process, so logs default to silent and
//! are routed to a file when the `debug` config option is set.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Logging configuration.
pub struct LogConfig {
    /// Whether to print logs to stderr.
    pub print: bool,
    /// Log level.
    pub level: LogLevel,
    /// Log file path (if any).
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            print: false,
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// Initialize logging with the given configuration.
///
/// Call once at plugin startup. Re-initialization attempts are ignored
/// so a host that loads the plugin twice does not panic.
pub fn init(config: LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let file_layer = config.file.as_ref().and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        let file: File = OpenOptions::new().create(true).append(true).open(path).ok()?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Arc::new(file)),
        )
    });

    let stderr_layer = config.print.then(|| {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
}

/// Get the default log file path.
pub fn default_log_path() -> Option<PathBuf> {
    crate::path::logs_dir().map(|p| p.join("dcp.log"))
}
