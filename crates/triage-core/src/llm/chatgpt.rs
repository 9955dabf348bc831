//! ChatGPT backend for any OpenAI-compatible chat completions endpoint.
//!
//! Sends one POST with a system/user message pair. Works against vanilla
//! OpenAI as well as Azure-style deployments where the URL already encodes
//! the model, which is why the key is sent both as `api-key` and as a
//! bearer token.

use super::backend::{GenerationRequest, LlmBackend};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Primary backend calling an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatGptBackend {
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ChatGptBackend {
    pub fn new(endpoint: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for ChatGptBackend {
    fn name(&self) -> &str {
        "chatgpt"
    }

    fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::Configuration {
                backend: self.name().to_string(),
                message: "missing endpoint URL or API key".to_string(),
            });
        }

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_message.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.clone(),
                },
            ],
        };

        tracing::debug!(url = %self.endpoint, "chatgpt.request");
        let resp = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LlmError::Transient {
                message: format!("ChatGPT request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if status.as_u16() >= 500 {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Transient {
                message: format!("ChatGPT server error {status}: {}", truncate(&text, 200)),
                status_code: Some(status.as_u16()),
            });
        }
        if status.as_u16() >= 400 {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Permanent {
                message: format!("ChatGPT client error {status}: {}", truncate(&text, 200)),
                status_code: Some(status.as_u16()),
            });
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| LlmError::Transient {
            message: format!("Failed to parse ChatGPT response: {e}"),
            status_code: None,
        })?;

        let content = chat_resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(LlmError::Transient {
                message: "ChatGPT returned an empty response".to_string(),
                status_code: None,
            });
        }

        tracing::info!(
            response_length = content.len(),
            model = chat_resp.model.as_deref().unwrap_or(&self.model),
            "chatgpt.response_received"
        );
        Ok(content)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Clip a response body for error messages.
fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configured_requires_endpoint_and_key() {
        let timeout = Duration::from_secs(5);
        let ok = ChatGptBackend::new("http://api.example.com/chat", "key123", "gpt-4o-mini", timeout);
        assert!(ok.is_configured());

        let no_url = ChatGptBackend::new("", "key123", "gpt-4o-mini", timeout);
        assert!(!no_url.is_configured());

        let no_key = ChatGptBackend::new("http://api.example.com/chat", "", "gpt-4o-mini", timeout);
        assert!(!no_key.is_configured());
    }

    #[tokio::test]
    async fn test_generate_unconfigured_is_configuration_error() {
        let backend = ChatGptBackend::new("", "", "gpt-4o-mini", Duration::from_secs(5));
        let request = GenerationRequest::new("sys", "prompt");
        let err = backend.generate(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::Configuration { .. }));
    }

    #[test]
    fn test_truncate_clips_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(truncate(&long, 200).len(), 200);
        assert_eq!(truncate("short", 200), "short");
    }
}
