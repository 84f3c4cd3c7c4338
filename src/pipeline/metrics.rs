//! Per-run counters and timings

use std::time::Duration;

/// Counters for one processing run, threaded through the batch and returned
/// with its result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub files_processed: usize,
    pub files_cached: usize,
    pub files_failed: usize,
    /// Extraction and detection calls, retries included
    pub backend_calls: u32,
    pub retries: u32,
    pub status_corrections: usize,
    pub decisions_extracted: usize,
    /// Decision records dropped as malformed
    pub decisions_dropped: usize,
    pub detection_time: Duration,
    pub extraction_time: Duration,
}

impl Metrics {
    /// Fold another accumulator into this one.
    pub fn absorb(&mut self, other: &Metrics) {
        self.files_processed += other.files_processed;
        self.files_cached += other.files_cached;
        self.files_failed += other.files_failed;
        self.backend_calls += other.backend_calls;
        self.retries += other.retries;
        self.status_corrections += other.status_corrections;
        self.decisions_extracted += other.decisions_extracted;
        self.decisions_dropped += other.decisions_dropped;
        self.detection_time += other.detection_time;
        self.extraction_time += other.extraction_time;
    }

    pub fn log_summary(&self) {
        tracing::info!(
            processed = self.files_processed,
            cached = self.files_cached,
            failed = self.files_failed,
            backend_calls = self.backend_calls,
            retries = self.retries,
            decisions = self.decisions_extracted,
            dropped = self.decisions_dropped,
            corrections = self.status_corrections,
            detection_ms = self.detection_time.as_millis() as u64,
            extraction_ms = self.extraction_time.as_millis() as u64,
            "Run summary"
        );
    }
}
