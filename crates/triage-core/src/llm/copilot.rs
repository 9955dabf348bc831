//! Copilot fallback backend driving the Copilot CLI as a child process.
//!
//! Each call spawns a fresh CLI session with piped stdio, writes one JSON
//! request line, waits up to the configured timeout for one JSON response
//! line, and tears the process down afterwards. An empty or absent response
//! is transient: the session machinery occasionally drops an event and a
//! fresh session usually succeeds.

use super::backend::{GenerationRequest, LlmBackend};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Fallback backend speaking line-delimited JSON to the Copilot CLI.
pub struct CopilotBackend {
    cli_path: String,
    github_token: String,
    model: String,
    timeout: Duration,
}

impl CopilotBackend {
    pub fn new(cli_path: &str, github_token: &str, model: &str, timeout: Duration) -> Self {
        Self {
            cli_path: cli_path.to_string(),
            github_token: github_token.to_string(),
            model: model.to_string(),
            timeout,
        }
    }
}

/// One request line sent to the CLI session.
#[derive(Serialize)]
struct SessionRequest<'a> {
    model: &'a str,
    system_message: &'a str,
    prompt: &'a str,
}

/// One response line read back from the CLI session.
#[derive(Deserialize)]
struct SessionResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmBackend for CopilotBackend {
    fn name(&self) -> &str {
        "copilot"
    }

    fn is_configured(&self) -> bool {
        !self.github_token.is_empty()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::Configuration {
                backend: self.name().to_string(),
                message: "missing GitHub token".to_string(),
            });
        }

        let mut child = Command::new(&self.cli_path)
            .arg("--stdio")
            .env("GITHUB_TOKEN", &self.github_token)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LlmError::Transient {
                message: format!("failed to spawn copilot CLI '{}': {e}", self.cli_path),
                status_code: None,
            })?;

        let result = self.run_session(&mut child, request).await;

        // Tear the session down regardless of outcome; kill errors only mean
        // the process already exited.
        let _ = child.kill().await;
        result
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CopilotBackend {
    async fn run_session(
        &self,
        child: &mut tokio::process::Child,
        request: &GenerationRequest,
    ) -> Result<String, LlmError> {
        let mut stdin = child.stdin.take().ok_or_else(|| LlmError::Transient {
            message: "copilot CLI stdin unavailable".to_string(),
            status_code: None,
        })?;
        let stdout = child.stdout.take().ok_or_else(|| LlmError::Transient {
            message: "copilot CLI stdout unavailable".to_string(),
            status_code: None,
        })?;

        let line = serde_json::to_string(&SessionRequest {
            model: &self.model,
            system_message: &request.system_message,
            prompt: &request.user_prompt,
        })
        .map_err(|e| LlmError::Transient {
            message: format!("failed to encode copilot request: {e}"),
            status_code: None,
        })?;

        let write_err = |e: std::io::Error| LlmError::Transient {
            message: format!("failed to write to copilot CLI: {e}"),
            status_code: None,
        };
        stdin.write_all(line.as_bytes()).await.map_err(write_err)?;
        stdin.write_all(b"\n").await.map_err(write_err)?;
        drop(stdin);

        let mut lines = BufReader::new(stdout).lines();
        let response_line = tokio::time::timeout(self.timeout, lines.next_line())
            .await
            .map_err(|_| LlmError::Transient {
                message: format!(
                    "copilot CLI timed out after {}s",
                    self.timeout.as_secs()
                ),
                status_code: None,
            })?
            .map_err(|e| LlmError::Transient {
                message: format!("failed to read from copilot CLI: {e}"),
                status_code: None,
            })?;

        let content = response_line
            .as_deref()
            .map(|raw| {
                serde_json::from_str::<SessionResponse>(raw)
                    .ok()
                    .and_then(|r| r.content)
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::Transient {
                message: "copilot CLI returned an empty response".to_string(),
                status_code: None,
            });
        }

        tracing::info!(response_length = content.len(), "copilot.response_received");
        Ok(content)
    }
}
