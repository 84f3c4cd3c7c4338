//! Bounded fan-out of per-file extraction
//!
//! At most `max_workers` files are in flight. Each task owns its decisions
//! until fan-in; a failing file is recorded and never stops its siblings.

use super::extract::{ExtractError, FileExtractor};
use super::metrics::Metrics;
use crate::decision::{validate, Decision, StatusCorrection};
use crate::manifest::{file_key, FileEntry};
use dashmap::DashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A file that produced no result, and why.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: ExtractError,
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Validated decisions, grouped by file in input order
    pub decisions: Vec<Decision>,
    pub failures: Vec<FileFailure>,
    /// Manifest entries for the files that succeeded
    pub entries: BTreeMap<String, FileEntry>,
    /// Union of participants detected across successful files
    pub participants: BTreeSet<String>,
    pub corrections: Vec<StatusCorrection>,
    pub metrics: Metrics,
}

struct Processed {
    name: String,
    decisions: Vec<Decision>,
    entry: FileEntry,
    corrections: Vec<StatusCorrection>,
}

struct TaskOutput {
    index: usize,
    outcome: Result<Processed, ExtractError>,
    metrics: Metrics,
}

/// Run `extractor` over every file with at most `max_workers` in flight.
///
/// Always completes; per-file failures are collected in
/// [`BatchResult::failures`].
pub async fn run_batch<E>(files: &[PathBuf], extractor: Arc<E>, max_workers: usize) -> BatchResult
where
    E: FileExtractor + ?Sized + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let detected: Arc<DashSet<String>> = Arc::new(DashSet::new());
    let mut tasks = JoinSet::new();

    tracing::info!(files = files.len(), workers = max_workers.max(1), "Starting extraction batch");

    for (index, path) in files.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        let extractor = extractor.clone();
        let detected = detected.clone();

        tasks.spawn(async move {
            let mut metrics = Metrics::default();
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return TaskOutput {
                    index,
                    outcome: Err(ExtractError::Task("worker pool closed".to_string())),
                    metrics,
                };
            };

            let outcome = match extractor.extract_file(&path, &mut metrics).await {
                Ok(extracted) => {
                    let mut decisions = Vec::with_capacity(extracted.decisions.len());
                    let mut corrections = Vec::new();
                    for raw in extracted.decisions {
                        let (decision, correction) = validate(raw);
                        corrections.extend(correction);
                        decisions.push(decision);
                    }
                    for name in extracted.participants_detected {
                        detected.insert(name);
                    }
                    let entry = FileEntry::new(
                        extracted.content_hash,
                        extracted.size,
                        extracted.mtime,
                        decisions.iter().map(Decision::to_value).collect(),
                    );
                    Ok(Processed {
                        name: file_key(&path),
                        decisions,
                        entry,
                        corrections,
                    })
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "Extraction failed");
                    Err(e)
                }
            };

            TaskOutput {
                index,
                outcome,
                metrics,
            }
        });
    }

    let mut outputs: Vec<Option<TaskOutput>> = (0..files.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(output) => {
                let index = output.index;
                outputs[index] = Some(output);
            }
            Err(e) => tracing::error!(error = %e, "Extraction task aborted"),
        }
    }

    let mut result = BatchResult::default();
    for (index, output) in outputs.into_iter().enumerate() {
        let path = files[index].clone();
        let Some(output) = output else {
            result.metrics.files_failed += 1;
            result.failures.push(FileFailure {
                path,
                error: ExtractError::Task("task did not complete".to_string()),
            });
            continue;
        };

        result.metrics.absorb(&output.metrics);
        match output.outcome {
            Ok(processed) => {
                result.metrics.files_processed += 1;
                result.metrics.decisions_extracted += processed.decisions.len();
                result.metrics.status_corrections += processed.corrections.len();
                result.decisions.extend(processed.decisions);
                result.corrections.extend(processed.corrections);
                result.entries.insert(processed.name, processed.entry);
            }
            Err(error) => {
                result.metrics.files_failed += 1;
                result.failures.push(FileFailure { path, error });
            }
        }
    }
    result.participants = detected.iter().map(|n| n.key().clone()).collect();

    tracing::info!(
        processed = result.metrics.files_processed,
        failed = result.metrics.files_failed,
        "Extraction batch finished"
    );
    result
}
