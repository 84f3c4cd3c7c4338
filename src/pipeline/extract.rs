//! Extraction of one transcript file
//!
//! read → detect participants (unless pinned) → extract with retry → parse →
//! fill meeting date and reference. Status validation happens at fan-in.

use super::metrics::Metrics;
use crate::backend::{BackendError, ExtractionBackend, ExtractionRequest};
use crate::config::TrackerConfig;
use crate::decision::{parse_response, Decision};
use crate::manifest::{fingerprint_bytes, format_mtime, file_key, Fingerprint};
use crate::retry::{call_with_retry, RetryPolicy};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Why a file produced no decisions.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("cannot read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The worker running the file stopped before reporting
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Raw output for one file, before validation.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub decisions: Vec<Decision>,
    /// Names reported by the backend for this file
    pub participants_detected: Vec<String>,
    /// Fingerprint of the bytes that were extracted from
    pub content_hash: Fingerprint,
    pub size: u64,
    pub mtime: String,
}

/// The per-file operation the scheduler fans out.
#[async_trait]
pub trait FileExtractor: Send + Sync {
    async fn extract_file(&self, path: &Path, metrics: &mut Metrics) -> Result<Extracted, ExtractError>;
}

/// [`FileExtractor`] backed by an [`ExtractionBackend`].
pub struct Extractor {
    backend: Arc<dyn ExtractionBackend>,
    participants: Vec<String>,
    participants_explicit: bool,
    policy: RetryPolicy,
}

impl Extractor {
    pub fn new(backend: Arc<dyn ExtractionBackend>, config: &TrackerConfig) -> Self {
        Self {
            backend,
            participants: config.participant_names(),
            participants_explicit: config.participants_explicit,
            policy: config.pipeline.retry_policy(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Participants to extract against: detected when allowed, else configured.
    async fn participants_for(&self, file_name: &str, transcript: &str, metrics: &mut Metrics) -> (Vec<String>, Vec<String>) {
        if self.participants_explicit {
            return (self.participants.clone(), Vec::new());
        }

        let start = Instant::now();
        metrics.backend_calls += 1;
        let detected = match self.backend.detect_participants(transcript).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Participant detection failed, using configured list");
                Vec::new()
            }
        };
        metrics.detection_time += start.elapsed();

        if detected.is_empty() {
            (self.participants.clone(), Vec::new())
        } else {
            tracing::info!(file = %file_name, participants = ?detected, "Detected participants");
            (detected.clone(), detected)
        }
    }
}

#[async_trait]
impl FileExtractor for Extractor {
    async fn extract_file(&self, path: &Path, metrics: &mut Metrics) -> Result<Extracted, ExtractError> {
        let file_name = file_key(path);
        let read_error = |e: std::io::Error| ExtractError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let bytes = tokio::fs::read(path).await.map_err(read_error)?;
        let metadata = tokio::fs::metadata(path).await.map_err(read_error)?;
        let transcript = String::from_utf8_lossy(&bytes);

        let (participants, mut detected) = self
            .participants_for(&file_name, &transcript, metrics)
            .await;

        let request = ExtractionRequest {
            file_name: &file_name,
            transcript: &transcript,
            participants: &participants,
        };
        let start = Instant::now();
        let attempted = call_with_retry(&file_name, &self.policy, || self.backend.extract(&request)).await;
        metrics.extraction_time += start.elapsed();
        metrics.backend_calls += attempted.attempts;
        metrics.retries += attempted.retries();
        let response = attempted.outcome?;

        let parsed = parse_response(&response);
        metrics.decisions_dropped += parsed.dropped;
        for name in parsed.participants_detected {
            if !detected.contains(&name) {
                detected.push(name);
            }
        }

        let meeting_date = date_in_name(&file_name)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let decisions: Vec<Decision> = parsed
            .decisions
            .into_iter()
            .map(|mut d| {
                if d.meeting_date.is_empty() {
                    d.meeting_date = meeting_date.clone();
                }
                if d.meeting_reference.is_empty() {
                    d.meeting_reference = file_name.clone();
                }
                d
            })
            .collect();

        tracing::debug!(file = %file_name, decisions = decisions.len(), "Extracted decisions");
        Ok(Extracted {
            decisions,
            participants_detected: detected,
            content_hash: fingerprint_bytes(&bytes),
            size: metadata.len(),
            mtime: format_mtime(&metadata),
        })
    }
}

/// First valid `YYYY-MM-DD` date in a file name.
pub fn date_in_name(name: &str) -> Option<NaiveDate> {
    let bytes = name.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    (0..=bytes.len() - 10).find_map(|i| {
        let window = &bytes[i..i + 10];
        let shaped = window.iter().enumerate().all(|(j, b)| match j {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shaped {
            return None;
        }
        std::str::from_utf8(window)
            .ok()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{mock_response, MockBackend};
    use crate::decision::{Significance, Status};
    use std::time::Duration;

    fn decision(title: &str) -> Decision {
        Decision::new("Process", Significance::new(2).unwrap(), Status::Agreed, title)
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1)).with_min_response_chars(10)
    }

    fn pinned(names: &[&str]) -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.set_explicit_participants(&names.iter().map(|n| n.to_string()).collect::<Vec<_>>());
        config
    }

    #[test]
    fn finds_dates_in_names() {
        assert_eq!(date_in_name("2025-01-15-standup.txt"), NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(date_in_name("standup_2024-12-31.txt"), NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(date_in_name("2025-13-45-bad.txt"), None);
        assert_eq!(date_in_name("notes.txt"), None);
    }

    #[tokio::test]
    async fn fills_date_and_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2025-03-04-sync.txt");
        std::fs::write(&path, "Ryan: agreed").unwrap();

        let backend = MockBackend::available()
            .with_response("2025-03-04-sync.txt", mock_response(&[decision("Ship")], &[]));
        let extractor = Extractor::new(Arc::new(backend), &pinned(&["Ryan"])).with_policy(fast());

        let mut metrics = Metrics::default();
        let out = extractor.extract_file(&path, &mut metrics).await.unwrap();

        assert_eq!(out.decisions.len(), 1);
        assert_eq!(out.decisions[0].meeting_date, "2025-03-04");
        assert_eq!(out.decisions[0].meeting_reference, "2025-03-04-sync.txt");
        assert_eq!(out.content_hash, fingerprint_bytes(b"Ryan: agreed"));
        assert_eq!(out.size, 12);
        assert_eq!(metrics.backend_calls, 1);
    }

    #[tokio::test]
    async fn pinned_participants_skip_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "text").unwrap();

        let backend = Arc::new(
            MockBackend::available()
                .with_detected(&["Zed"])
                .with_default_response(mock_response(&[], &[])),
        );
        let extractor = Extractor::new(backend.clone(), &pinned(&["Ryan"])).with_policy(fast());
        extractor.extract_file(&path, &mut Metrics::default()).await.unwrap();

        assert_eq!(backend.detect_calls(), 0);
    }

    #[tokio::test]
    async fn detection_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "text").unwrap();

        let backend = Arc::new(
            MockBackend::available()
                .with_detection_failure(BackendError::Timeout(Duration::from_secs(120)))
                .with_default_response(mock_response(&[decision("x")], &["Ajit"])),
        );
        let extractor = Extractor::new(backend.clone(), &TrackerConfig::default()).with_policy(fast());
        let out = extractor.extract_file(&path, &mut Metrics::default()).await.unwrap();

        assert_eq!(backend.detect_calls(), 1);
        assert_eq!(out.participants_detected, vec!["Ajit"]);
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Extractor::new(Arc::new(MockBackend::available()), &TrackerConfig::default());
        let err = extractor
            .extract_file(&dir.path().join("gone.txt"), &mut Metrics::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Read { .. }));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "text").unwrap();

        let backend = MockBackend::available()
            .with_failure("a.txt", BackendError::EmptyResponse("nothing".into()));
        let extractor = Extractor::new(Arc::new(backend), &pinned(&["Ryan"])).with_policy(fast());

        let mut metrics = Metrics::default();
        let err = extractor.extract_file(&path, &mut metrics).await.unwrap_err();

        assert!(matches!(err, ExtractError::Backend(BackendError::EmptyResponse(_))));
        assert_eq!(metrics.backend_calls, 4);
        assert_eq!(metrics.retries, 3);
    }
}
