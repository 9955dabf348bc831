//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.breaker.fail_max == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.fail_max must be > 0".into(),
            ));
        }
        if self.breaker.reset_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.reset_timeout_secs must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        if self.retry.wait_min_ms > self.retry.wait_max_ms {
            return Err(ConfigError::ValidationError(
                "retry.wait_min_ms must be <= retry.wait_max_ms".into(),
            ));
        }
        if self.chatgpt.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "chatgpt.timeout_secs must be > 0".into(),
            ));
        }
        if self.copilot.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "copilot.timeout_secs must be > 0".into(),
            ));
        }
        if !self.chatgpt.endpoint.is_empty()
            && !self.chatgpt.endpoint.starts_with("http://")
            && !self.chatgpt.endpoint.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "chatgpt.endpoint must start with http:// or https://".into(),
            ));
        }
        Ok(())
    }
}
