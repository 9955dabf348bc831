//! Sub-configuration structs with defaults matching the deployment image.

use serde::{Deserialize, Serialize};

/// ChatGPT / OpenAI-compatible endpoint settings (primary backend).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatGptConfig {
    /// Full URL of the chat completions endpoint. Leave empty to skip the
    /// primary backend and go straight to the Copilot fallback.
    pub endpoint: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name sent in the request body. Ignored when the deployment URL
    /// already encodes the model (Azure-style).
    pub model: String,

    /// HTTP timeout in seconds for each call
    pub timeout_secs: u64,
}

impl Default for ChatGptConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: "${CHATGPT_API_KEY}".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
        }
    }
}

/// GitHub Copilot CLI settings (fallback backend).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    /// Path to the Copilot CLI binary
    pub cli_path: String,

    /// Personal access token with Copilot access (supports ${ENV_VAR} syntax)
    pub github_token: String,

    /// Model identifier forwarded to the CLI session
    pub model: String,

    /// Seconds to wait for one session response event
    pub timeout_secs: u64,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            cli_path: "copilot".to_string(),
            github_token: "${GITHUB_TOKEN}".to_string(),
            model: "gpt-4o".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Circuit breaker thresholds, applied to both backends independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before a backend's circuit opens
    pub fail_max: u32,

    /// Seconds before an open circuit allows a probe call
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 3,
            reset_timeout_secs: 60,
        }
    }
}

/// Retry policy for transient backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per backend call (1 = no retries)
    pub max_attempts: u32,

    /// Minimum backoff between attempts in milliseconds
    pub wait_min_ms: u64,

    /// Maximum backoff between attempts in milliseconds
    pub wait_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_min_ms: 1000,
            wait_max_ms: 30_000,
        }
    }
}

/// Epic store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for per-project epic storage
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "~/.triage/store".to_string(),
        }
    }
}

/// Inbound mail spool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// Directory polled for inbound requirement messages
    pub dir: String,

    /// Directory where generated replies are written
    pub outbox_dir: String,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            dir: "~/.triage/spool".to_string(),
            outbox_dir: "~/.triage/outbox".to_string(),
        }
    }
}

/// System-message rules files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory containing challenge-requirements.md and email-format.md
    pub dir: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dir: "~/.triage/rules".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
