//! LLM backend trait and request type.
//!
//! Defines the capability every text-generation backend implements, so the
//! facade can hold two interchangeable backends behind `Box<dyn LlmBackend>`.

use crate::error::LlmError;
use async_trait::async_trait;
use std::time::Duration;

/// A system/user message pair ready to send to a backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Instructions and rules for the model
    pub system_message: String,
    /// The actual task prompt
    pub user_prompt: String,
}

impl GenerationRequest {
    pub fn new(system_message: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_message: system_message.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Trait that all LLM backends implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Box<dyn LlmBackend>` for dynamic dispatch).
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Backend name for logging and breaker identification
    /// (e.g., "chatgpt", "copilot").
    fn name(&self) -> &str;

    /// Whether required credentials/endpoints are present. An unconfigured
    /// backend is skipped by the facade without counting as a failure.
    fn is_configured(&self) -> bool;

    /// Generate a completion for the given request.
    ///
    /// Errors carry their retry classification: `Transient` for 5xx,
    /// timeouts, connectivity failures and empty responses; `Permanent` for
    /// 4xx; `Configuration` when credentials are missing.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;

    /// Per-call timeout for this backend.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
