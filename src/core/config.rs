//! `apollo.toml` configuration.
//!
//! Every section is optional. A missing file means defaults; a malformed one is
//! an error naming the offending path.

use crate::core::error::ApolloError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const CONFIG_FILE_NAME: &str = "apollo.toml";

static CHANNEL_TYPE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*$").expect("channel type pattern is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApolloConfig {
    pub logging: LoggingConfig,
    pub scheduling: SchedulingConfig,
    pub communication: CommunicationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `APOLLO_LOG` is unset, e.g. `info` or `apollo=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingConfig {
    /// SQLite schedule store consulted by `apollo schedule verify`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommunicationConfig {
    /// Channel types an `EndpointConnect` message may announce.
    pub channel_types: Vec<String>,
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            channel_types: vec!["named_pipe".to_string(), "tcp".to_string()],
        }
    }
}

impl ApolloConfig {
    /// Loads `explicit` if given, else `<dir>/apollo.toml` when it exists, else defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self, ApolloError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = dir.join(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let contents = fs::read_to_string(&path).map_err(|e| {
            ApolloError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: ApolloConfig = toml::from_str(&contents).map_err(|e| {
            ApolloError::ConfigError(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate().map_err(|e| match e {
            ApolloError::ConfigError(msg) => {
                ApolloError::ConfigError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ApolloError> {
        if self.logging.level.trim().is_empty() {
            return Err(ApolloError::ConfigError(
                "logging.level must not be empty".to_string(),
            ));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            return Err(ApolloError::ConfigError(format!(
                "logging.level '{}' is not a valid filter directive",
                self.logging.level
            )));
        }

        let mut seen = Vec::with_capacity(self.communication.channel_types.len());
        for name in &self.communication.channel_types {
            if !CHANNEL_TYPE_NAME.is_match(name) {
                return Err(ApolloError::ConfigError(format!(
                    "communication.channel_types entry '{name}' must be lower snake case"
                )));
            }
            if seen.contains(&name) {
                return Err(ApolloError::ConfigError(format!(
                    "communication.channel_types lists '{name}' twice"
                )));
            }
            seen.push(name);
        }
        Ok(())
    }
}
