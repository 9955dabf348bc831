//! Primary/fallback LLM facade.
//!
//! Each backend is wrapped in two independent layers: a bounded retry policy
//! on the inside and a circuit breaker on the outside, so the breaker sees
//! only the final outcome of a whole retry sequence. The facade prefers the
//! primary backend on every call; there is no sticky failover memory beyond
//! what the breaker states already encode.

use super::backend::{resolve_env_var, GenerationRequest, LlmBackend};
use super::breaker::{BreakerSettings, CircuitBreaker};
use super::chatgpt::ChatGptBackend;
use super::copilot::CopilotBackend;
use super::retry::RetryPolicy;
use crate::config::Config;
use crate::error::LlmError;
use std::time::Duration;

/// One backend composed with its retry policy and circuit breaker.
pub struct GuardedBackend {
    backend: Box<dyn LlmBackend>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl GuardedBackend {
    pub fn new(backend: Box<dyn LlmBackend>, settings: BreakerSettings, retry: RetryPolicy) -> Self {
        let breaker = CircuitBreaker::new(backend.name().to_string(), settings);
        Self {
            backend,
            breaker,
            retry,
        }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    /// Breaker state, exposed for run summaries and tests.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// `breaker.call(retry.execute(backend.generate))`.
    ///
    /// An exhausted retry sequence reaches the breaker as exactly one
    /// failure; intermediate attempts never do.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.breaker
            .call(|| self.retry.execute(|| self.backend.generate(request)))
            .await
    }
}

/// Facade that tries the primary backend first and falls back to the
/// secondary.
///
/// Both breakers live as long as the client, which is created once per run:
/// failures observed while processing one project keep protecting every
/// later project in the same run from hammering a dead endpoint.
pub struct LlmClient {
    primary: GuardedBackend,
    fallback: GuardedBackend,
}

impl LlmClient {
    pub fn new(primary: GuardedBackend, fallback: GuardedBackend) -> Self {
        Self { primary, fallback }
    }

    /// Build the chatgpt-primary / copilot-fallback pair from configuration,
    /// resolving `${ENV_VAR}` secrets.
    pub fn from_config(config: &Config) -> Self {
        let retry = RetryPolicy::new(
            config.retry.max_attempts,
            Duration::from_millis(config.retry.wait_min_ms),
            Duration::from_millis(config.retry.wait_max_ms),
        );
        let settings = BreakerSettings {
            fail_max: config.breaker.fail_max,
            reset_timeout: Duration::from_secs(config.breaker.reset_timeout_secs),
        };

        let api_key = resolve_env_var(&config.chatgpt.api_key).unwrap_or_default();
        let chatgpt = ChatGptBackend::new(
            &config.chatgpt.endpoint,
            &api_key,
            &config.chatgpt.model,
            Duration::from_secs(config.chatgpt.timeout_secs),
        );

        let github_token = resolve_env_var(&config.copilot.github_token).unwrap_or_default();
        let copilot = CopilotBackend::new(
            &config.copilot.cli_path,
            &github_token,
            &config.copilot.model,
            Duration::from_secs(config.copilot.timeout_secs),
        );

        Self::new(
            GuardedBackend::new(Box::new(chatgpt), settings.clone(), retry.clone()),
            GuardedBackend::new(Box::new(copilot), settings, retry),
        )
    }

    /// Generate a completion, trying the primary backend first.
    ///
    /// Falls back to the secondary on any primary failure, including an open
    /// circuit. Fails with [`LlmError::AllBackendsUnavailable`] when the
    /// fallback also fails (or is unconfigured while the primary was not
    /// usable), and with [`LlmError::NotConfigured`] when neither backend
    /// has credentials.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let primary_configured = self.primary.is_configured();
        if primary_configured {
            match self.primary.generate(request).await {
                Ok(text) => {
                    tracing::info!(backend = self.primary.name(), "llm.backend_used");
                    return Ok(text);
                }
                Err(LlmError::CircuitOpen { .. }) => {
                    tracing::warn!(
                        backend = self.primary.name(),
                        reason = "circuit open",
                        "llm.falling_back"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        backend = self.primary.name(),
                        error = %err,
                        "llm.falling_back"
                    );
                }
            }
        } else {
            tracing::info!(
                backend = self.primary.name(),
                reason = "not configured",
                "llm.primary_skipped"
            );
        }

        if self.fallback.is_configured() {
            match self.fallback.generate(request).await {
                Ok(text) => {
                    tracing::info!(backend = self.fallback.name(), "llm.backend_used");
                    Ok(text)
                }
                Err(err) => Err(LlmError::AllBackendsUnavailable {
                    message: format!("{} failed: {err}", self.fallback.name()),
                }),
            }
        } else if primary_configured {
            Err(LlmError::AllBackendsUnavailable {
                message: format!(
                    "{} failed and {} is not configured",
                    self.primary.name(),
                    self.fallback.name()
                ),
            })
        } else {
            Err(LlmError::NotConfigured)
        }
    }

    /// The primary guarded backend (for introspection and tests).
    pub fn primary(&self) -> &GuardedBackend {
        &self.primary
    }

    /// The fallback guarded backend (for introspection and tests).
    pub fn fallback(&self) -> &GuardedBackend {
        &self.fallback
    }
}
