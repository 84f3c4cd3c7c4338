//! Scripted backend for tests

use super::traits::{BackendError, ExtractionBackend, ExtractionRequest};
use crate::decision::Decision;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Scripted = Result<String, BackendError>;

/// Mock backend: returns preconfigured responses per file name.
///
/// A file's script is consumed one entry per call; the last entry repeats
/// once the script runs out. Calls, detection calls and peak concurrency are
/// recorded for assertions.
pub struct MockBackend {
    available: bool,
    scripts: HashMap<String, Vec<Scripted>>,
    fallback: Option<Scripted>,
    detected: Result<Vec<String>, BackendError>,
    delay: Option<Duration>,
    calls: DashMap<String, usize>,
    detect_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockBackend {
    /// A mock backend that answers calls.
    pub fn available() -> Self {
        Self {
            available: true,
            scripts: HashMap::new(),
            fallback: None,
            detected: Ok(Vec::new()),
            delay: None,
            calls: DashMap::new(),
            detect_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// A mock backend whose every call fails permanently.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Always answer `file_name` with `response`.
    pub fn with_response(self, file_name: impl Into<String>, response: impl Into<String>) -> Self {
        self.with_sequence(file_name, vec![Ok(response.into())])
    }

    /// Always fail `file_name` with `error`.
    pub fn with_failure(self, file_name: impl Into<String>, error: BackendError) -> Self {
        self.with_sequence(file_name, vec![Err(error)])
    }

    /// Answer successive calls for `file_name` from `script`.
    pub fn with_sequence(mut self, file_name: impl Into<String>, script: Vec<Scripted>) -> Self {
        self.scripts.insert(file_name.into(), script);
        self
    }

    /// Answer for any file without a script of its own.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(Ok(response.into()));
        self
    }

    /// Names reported by participant detection.
    pub fn with_detected(mut self, names: &[&str]) -> Self {
        self.detected = Ok(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_detection_failure(mut self, error: BackendError) -> Self {
        self.detected = Err(error);
        self
    }

    /// Hold every extraction call for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Extraction calls made for `file_name`.
    pub fn calls_for(&self, file_name: &str) -> usize {
        self.calls.get(file_name).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|c| *c.value()).sum()
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    /// Most extraction calls ever in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_for(&self, file_name: &str) -> Scripted {
        let index = {
            let mut count = self.calls.entry(file_name.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };
        match self.scripts.get(file_name) {
            Some(script) if !script.is_empty() => script[index.min(script.len() - 1)].clone(),
            _ => self.fallback.clone().unwrap_or_else(|| {
                Err(BackendError::Other(format!(
                    "no mock response for file '{}'",
                    file_name
                )))
            }),
        }
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    fn id(&self) -> &str {
        "mock"
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<String, BackendError> {
        if !self.available {
            return Err(BackendError::Unavailable(
                "mock backend configured as unavailable".to_string(),
            ));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.next_for(request.file_name);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn detect_participants(&self, _transcript: &str) -> Result<Vec<String>, BackendError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        self.detected.clone()
    }
}

/// Build a backend response holding `decisions`.
pub fn mock_response(decisions: &[Decision], participants_detected: &[&str]) -> String {
    serde_json::json!({
        "decisions": decisions.iter().map(Decision::to_value).collect::<Vec<_>>(),
        "participants_detected": participants_detected,
    })
    .to_string()
}
