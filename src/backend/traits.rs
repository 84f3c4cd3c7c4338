//! Extraction backend contract
//!
//! A backend turns transcript text into a raw response holding decision
//! records. How it gets there (CLI subprocess, HTTP API, canned test data)
//! is its own business.

use async_trait::async_trait;
use std::time::Duration;

/// Whether retrying a failed call can plausibly help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Errors from backend calls, each tagged with a [`FailureKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No usable output: empty, too short, or the tool exited without any
    #[error("empty response: {0}")]
    EmptyResponse(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Tool or service missing
    #[error("backend not available: {0}")]
    Unavailable(String),
    #[error("authorization failed: {0}")]
    Unauthorized(String),
    #[error("backend error: {0}")]
    Other(String),
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::EmptyResponse(_) | Self::Timeout(_) => FailureKind::Transient,
            Self::Unavailable(_) | Self::Unauthorized(_) | Self::Other(_) => FailureKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

/// One extraction call.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Source file name, for logging and meeting references
    pub file_name: &'a str,
    pub transcript: &'a str,
    /// Names the backend should report agreement for
    pub participants: &'a [String],
}

/// The capability the pipeline needs from a text-generation backend.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Run decision extraction and return the raw response text.
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<String, BackendError>;

    /// Name the people actively deciding in a transcript.
    ///
    /// Backends without a detection call report nobody.
    async fn detect_participants(&self, _transcript: &str) -> Result<Vec<String>, BackendError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_by_variant() {
        assert_eq!(BackendError::EmptyResponse("".into()).kind(), FailureKind::Transient);
        assert_eq!(BackendError::Timeout(Duration::from_secs(1)).kind(), FailureKind::Transient);
        assert_eq!(BackendError::Unavailable("claude".into()).kind(), FailureKind::Permanent);
        assert_eq!(BackendError::Unauthorized("401".into()).kind(), FailureKind::Permanent);
        assert_eq!(BackendError::Other("boom".into()).kind(), FailureKind::Permanent);
    }
}
