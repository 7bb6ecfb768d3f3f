//! Diagnostic logging.
//!
//! Processors receive a [`Logger`] rather than calling `tracing` directly so
//! callers (and tests) can observe every diagnostic they emit.

use crate::core::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a filter directive that overrides the config.
pub const LOG_ENV_VAR: &str = "APOLLO_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogSeverity::Trace => "trace",
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

pub type Logger = Arc<dyn Fn(LogSeverity, &str) + Send + Sync>;

/// A [`Logger`] that forwards to the installed `tracing` subscriber.
pub fn tracing_logger() -> Logger {
    Arc::new(|severity: LogSeverity, text: &str| match severity {
        LogSeverity::Trace => tracing::trace!(target: "apollo", "{text}"),
        LogSeverity::Debug => tracing::debug!(target: "apollo", "{text}"),
        LogSeverity::Info => tracing::info!(target: "apollo", "{text}"),
        LogSeverity::Warning => tracing::warn!(target: "apollo", "{text}"),
        LogSeverity::Error => tracing::error!(target: "apollo", "{text}"),
        LogSeverity::Fatal => tracing::error!(target: "apollo", fatal = true, "{text}"),
    })
}

fn default_directive(verbosity: u8, config: &LoggingConfig) -> String {
    match verbosity {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the stderr subscriber. Later calls are ignored.
pub fn init(verbosity: u8, config: &LoggingConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity, config)));

    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
