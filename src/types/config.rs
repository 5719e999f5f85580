//! Configuration structures.
//!
//! Configuration is loaded from a JSON file (optional) and then overridden by
//! `CONTENTFLOW_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::{Error, Result};
use humantime_serde::re::humantime;

pub const ENV_LOG_LEVEL: &str = "CONTENTFLOW_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "CONTENTFLOW_LOG_FORMAT";
pub const ENV_AGENT_TIMEOUT: &str = "CONTENTFLOW_AGENT_TIMEOUT";

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Standard agent executor configuration.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Pipeline orchestrator configuration.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Agent executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Deadline applied to agents that do not declare their own timeout.
    #[serde(with = "humantime_serde")]
    pub default_agent_timeout: Option<Duration>,

    /// Maximum number of sub-progress entries recorded per agent run.
    pub max_progress_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_agent_timeout: None,
            max_progress_steps: 256,
        }
    }
}

/// Pipeline orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Emit a snapshot when an agent settles even if nothing changed since
    /// the last streamed update.
    pub emit_settled_updates: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            emit_settled_updates: true,
        }
    }
}

impl Config {
    /// Parse a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::config(format!("invalid config: {}", e)))
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Load the file (if any), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `CONTENTFLOW_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.observability.log_level = level;
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.observability.json_logs = match format.to_ascii_lowercase().as_str() {
                "json" => true,
                "compact" | "text" | "plain" => false,
                other => {
                    return Err(Error::config(format!(
                        "{} must be 'json' or 'compact', got '{}'",
                        ENV_LOG_FORMAT, other
                    )))
                }
            };
        }

        if let Some(raw) = lookup(ENV_AGENT_TIMEOUT) {
            let timeout = humantime::parse_duration(raw.trim()).map_err(|e| {
                Error::config(format!("{} is not a duration: {}", ENV_AGENT_TIMEOUT, e))
            })?;
            self.executor.default_agent_timeout = Some(timeout);
        }

        Ok(())
    }
}
