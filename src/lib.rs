//! Groundtruth: decision tracking for meeting transcripts
//!
//! Extracts structured decisions from transcripts through a text-generation
//! backend and keeps a per-directory manifest so that unchanged transcripts
//! are never extracted twice.
//!
//! # Core Concepts
//!
//! - **Decision**: one extracted decision with per-participant agreement; its
//!   status is always derived from those agreements
//! - **Manifest**: content-addressed cache of extraction results for one
//!   directory, invalidated by file content, config or framework changes
//! - **Backend**: anything that turns transcript text into decision records
//!
//! # Example
//!
//! ```
//! use groundtruth::{compute_status, AgreementValue, Status};
//! use std::collections::BTreeMap;
//!
//! let mut agreements = BTreeMap::new();
//! agreements.insert("Ryan".to_string(), AgreementValue::Yes);
//! agreements.insert("Ajit".to_string(), AgreementValue::Partial);
//! assert_eq!(compute_status(&agreements), Some(Status::NeedsClarification));
//! ```

pub mod backend;
pub mod config;
mod decision;
pub mod manifest;
pub mod pipeline;
pub mod report;
pub mod retry;

pub use backend::{
    mock_response, BackendError, CliBackend, ExtractionBackend, ExtractionRequest, FailureKind,
    MockBackend,
};
pub use config::{ConfigError, Framework, TrackerConfig};
pub use decision::{
    compute_status, decode_decisions, enforce_status, parse_participants, parse_response,
    validate, AgreementValue, Decision, ParsedResponse, Significance, Status, StatusCorrection,
};
pub use manifest::{Fingerprint, Manifest, ManifestError};
pub use pipeline::{
    process_file, process_root, run_batch, BatchResult, Metrics, PipelineError, RunOptions,
    RunSummary,
};
pub use retry::{call_with_retry, RetryPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
