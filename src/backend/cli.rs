//! Backend that shells out to a text-generation CLI

use super::prompt::{self, PromptBuilder};
use super::traits::{BackendError, ExtractionBackend, ExtractionRequest};
use crate::config::{Provider, TrackerConfig};
use crate::decision::parse_participants;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Stderr fragments that mean retrying cannot help.
const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "authentication",
    "authorization",
    "api key",
    "invalid_api_key",
    "not logged in",
    "401",
    "403",
];

/// Spawns the configured executable once per call.
pub struct CliBackend {
    id: String,
    provider: Provider,
    executable: String,
    model: Option<String>,
    prompts: PromptBuilder,
    extraction_timeout: Duration,
    detection_timeout: Duration,
}

impl CliBackend {
    pub fn from_config(config: &TrackerConfig) -> Self {
        let executable = config.backend.executable.clone();
        Self {
            id: format!("cli:{}", executable),
            provider: config.backend.provider,
            executable,
            model: config.backend.model.clone(),
            prompts: PromptBuilder::new(config),
            extraction_timeout: config.pipeline.extraction_timeout(),
            detection_timeout: config.pipeline.detection_timeout(),
        }
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        match self.provider {
            Provider::ClaudeCode => {
                cmd.args(["--print", "--output-format", "json"]);
                if let Some(model) = &self.model {
                    cmd.args(["--model", model]);
                }
                cmd.arg(prompt).stdin(Stdio::null());
            }
            Provider::Command => {
                cmd.stdin(Stdio::piped());
            }
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one prompt to completion within `limit`.
    async fn run(&self, prompt: &str, limit: Duration) -> Result<String, BackendError> {
        let mut child = self.command(prompt).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::Unavailable(format!("'{}' not found", self.executable))
            } else {
                BackendError::Other(format!("failed to start '{}': {}", self.executable, e))
            }
        })?;

        // Feed stdin while stdout drains so a large prompt cannot fill both pipes.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(prompt.as_bytes()).await {
                // a child that exits without reading is judged by its exit status
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };

        let exchange = async { tokio::join!(feed, child.wait_with_output()) };
        let (fed, output) = match timeout(limit, exchange).await {
            Ok(pair) => pair,
            Err(_) => return Err(BackendError::Timeout(limit)),
        };
        let output = output.map_err(|e| BackendError::Other(format!("failed to read output: {}", e)))?;
        fed.map_err(|e| BackendError::Other(format!("failed to write prompt: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&format!("{}: {}", output.status, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(BackendError::EmptyResponse("CLI produced no output".to_string()));
        }
        check_envelope(&stdout)?;
        Ok(stdout)
    }
}

/// Map a failed run to a tagged error.
fn classify_failure(message: &str) -> BackendError {
    let lower = message.to_lowercase();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        BackendError::Unauthorized(message.to_string())
    } else {
        BackendError::EmptyResponse(format!("CLI failed with {}", message))
    }
}

/// The JSON envelope can report an error with a zero exit status.
fn check_envelope(stdout: &str) -> Result<(), BackendError> {
    let Ok(envelope) = serde_json::from_str::<serde_json::Value>(stdout) else {
        return Ok(());
    };
    if envelope.get("is_error").and_then(|v| v.as_bool()) == Some(true) {
        let message = envelope
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or("error reported by backend");
        return Err(classify_failure(message));
    }
    Ok(())
}

#[async_trait]
impl ExtractionBackend for CliBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<String, BackendError> {
        let prompt = self
            .prompts
            .extraction(request.transcript, request.participants);
        tracing::debug!(
            backend = %self.id,
            file = %request.file_name,
            prompt_chars = prompt.len(),
            "Running extraction"
        );
        self.run(&prompt, self.extraction_timeout).await
    }

    async fn detect_participants(&self, transcript: &str) -> Result<Vec<String>, BackendError> {
        let response = self
            .run(&prompt::detection(transcript), self.detection_timeout)
            .await?;
        Ok(parse_participants(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(executable: &str, provider: Provider) -> CliBackend {
        let mut config = TrackerConfig::default();
        config.backend.executable = executable.to_string();
        config.backend.provider = provider;
        config.pipeline.extraction_timeout_secs = 5;
        CliBackend::from_config(&config)
    }

    fn request<'a>(participants: &'a [String]) -> ExtractionRequest<'a> {
        ExtractionRequest {
            file_name: "meeting.txt",
            transcript: "Ryan: ship it",
            participants,
        }
    }

    #[test]
    fn auth_failures_are_permanent() {
        assert!(matches!(
            classify_failure("exit status: 1: Invalid API key"),
            BackendError::Unauthorized(_)
        ));
        let err = classify_failure("exit status: 1: overloaded");
        assert!(err.is_transient());
    }

    #[test]
    fn error_envelope_is_classified() {
        let err = check_envelope(r#"{"is_error": true, "result": "Not logged in"}"#).unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized(_)));
        assert!(check_envelope(r#"{"is_error": false, "result": "{}"}"#).is_ok());
        assert!(check_envelope("plain text").is_ok());
    }

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let cli = backend("groundtruth-no-such-binary", Provider::ClaudeCode);
        let err = cli.extract(&request(&[])).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert!(!err.is_transient());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_provider_reads_stdout() {
        // `cat` echoes the prompt back
        let cli = backend("cat", Provider::Command);
        let out = cli.extract(&request(&["Ryan".to_string()])).await.unwrap();
        assert!(out.ends_with("Ryan: ship it"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_prompt_on_stdin_does_not_stall() {
        let cli = backend("cat", Provider::Command);
        let transcript = "a".repeat(1_000_000);
        let participants = ["Ryan".to_string()];
        let req = ExtractionRequest {
            file_name: "long.txt",
            transcript: &transcript,
            participants: &participants,
        };

        let out = tokio::time::timeout(Duration::from_secs(30), cli.extract(&req))
            .await
            .expect("extraction stalled")
            .unwrap();
        assert!(out.len() > 1_000_000);
        assert!(out.ends_with(&transcript[..100]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_transient() {
        let cli = backend("false", Provider::Command);
        let err = cli.extract(&request(&[])).await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }
}
