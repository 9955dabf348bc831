//! Configuration management for triage.
//!
//! Configuration is loaded from a TOML file with sensible defaults; every
//! section can be omitted. Secrets support `${ENV_VAR}` indirection so the
//! file itself never needs to hold credentials.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for triage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary LLM backend (OpenAI-compatible endpoint)
    pub chatgpt: ChatGptConfig,

    /// Fallback LLM backend (Copilot CLI)
    pub copilot: CopilotConfig,

    /// Circuit breaker thresholds
    pub breaker: BreakerConfig,

    /// Retry policy for transient failures
    pub retry: RetryConfig,

    /// Epic store location
    pub storage: StorageConfig,

    /// Inbound spool and reply outbox
    pub spool: SpoolConfig,

    /// Rules files used to build the system message
    pub rules: RulesConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories, falling back to
    /// ~/.triage/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "jarvis", "triage")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".triage").join("config.toml")
            })
    }

    /// Resolved epic-store root (with ~ expansion).
    pub fn storage_root(&self) -> PathBuf {
        expand(&self.storage.root)
    }

    /// Resolved spool directory (with ~ expansion).
    pub fn spool_dir(&self) -> PathBuf {
        expand(&self.spool.dir)
    }

    /// Resolved reply outbox directory (with ~ expansion).
    pub fn outbox_dir(&self) -> PathBuf {
        expand(&self.spool.outbox_dir)
    }

    /// Resolved rules directory (with ~ expansion).
    pub fn rules_dir(&self) -> PathBuf {
        expand(&self.rules.dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
