//! One processing run over a root directory
//!
//! discover → filter by date → load manifest → partition → batch →
//! reconcile → save manifest. A dry run stops after partitioning.

use super::extract::{date_in_name, ExtractError, Extractor};
use super::metrics::Metrics;
use super::scheduler::{run_batch, BatchResult, FileFailure};
use crate::backend::ExtractionBackend;
use crate::config::{Framework, TrackerConfig};
use crate::decision::{Decision, StatusCorrection};
use crate::manifest::{
    self, cache_state, file_key, fingerprint_text, partition, reconcile, CacheState, RunIdentity,
    MANIFEST_FILENAME,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PATTERN: &str = "*.txt";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("No files matching '{pattern}' in {root}")]
    NoFiles { root: PathBuf, pattern: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Glob matched against file names in the root
    pub pattern: String,
    /// Inclusive date range applied to dates found in file names
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Partition only; never call the backend or write the manifest
    pub dry_run: bool,
    /// Ignore any existing manifest
    pub force: bool,
    /// Report name recorded in the manifest
    pub output_file: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            from: None,
            to: None,
            dry_run: false,
            force: false,
            output_file: String::new(),
        }
    }
}

/// What a run did, file by file, and what it produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub root: PathBuf,
    pub cache_state: CacheState,
    /// Files extracted this run
    pub processed: Vec<String>,
    /// Files served from the manifest
    pub cached: Vec<String>,
    /// Files a dry run would have extracted
    pub pending: Vec<String>,
    pub failed: Vec<FileFailure>,
    /// Fresh decisions first, then cached ones
    pub decisions: Vec<Decision>,
    /// Participant columns for reporting
    pub participants: Vec<String>,
    pub corrections: Vec<StatusCorrection>,
    pub metrics: Metrics,
    pub manifest_saved: bool,
    pub dry_run: bool,
}

impl RunSummary {
    fn new(root: &Path, cache_state: CacheState, dry_run: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            cache_state,
            processed: Vec::new(),
            cached: Vec::new(),
            pending: Vec::new(),
            failed: Vec::new(),
            decisions: Vec::new(),
            participants: Vec::new(),
            corrections: Vec::new(),
            metrics: Metrics::default(),
            manifest_saved: false,
            dry_run,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Files in `root` matching `pattern`, sorted. The manifest itself is skipped.
pub fn discover_files(root: &Path, pattern: &str) -> PipelineResult<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let full = Path::new(&escaped).join(pattern);
    let full = full.to_string_lossy();
    let entries = glob::glob(&full).map_err(|source| PipelineError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable path");
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| !file_key(path).starts_with(MANIFEST_FILENAME))
        .collect();
    files.sort();
    Ok(files)
}

/// Keep files whose name carries a date inside `[from, to]`.
///
/// With no bounds every file is kept; with bounds, undated files are dropped.
pub fn filter_by_date(files: Vec<PathBuf>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Vec<PathBuf> {
    if from.is_none() && to.is_none() {
        return files;
    }
    files
        .into_iter()
        .filter(|path| {
            let name = file_key(path);
            match date_in_name(&name) {
                Some(date) => from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t),
                None => {
                    tracing::debug!(file = %name, "No date in file name, excluded by date filter");
                    false
                }
            }
        })
        .collect()
}

/// Participant columns for a run's report.
///
/// A pinned list is used as is. Otherwise names detected during the run and
/// names appearing in agreements are combined, falling back to the
/// configured list when there are none.
pub fn report_participants(
    config: &TrackerConfig,
    detected: &BTreeSet<String>,
    decisions: &[Decision],
) -> Vec<String> {
    if config.participants_explicit {
        return config.participant_names();
    }
    let mut names: BTreeSet<String> = detected.clone();
    for decision in decisions {
        names.extend(decision.agreements.keys().cloned());
    }
    if names.is_empty() {
        config.participant_names()
    } else {
        names.into_iter().collect()
    }
}

/// Process every matching file under `root`, reusing cached results.
///
/// Per-file failures are reported in the summary, never as an error. A
/// manifest that cannot be saved is logged; the run's results still stand.
pub async fn process_root(
    root: &Path,
    config: &TrackerConfig,
    framework: &Framework,
    options: &RunOptions,
    backend: Arc<dyn ExtractionBackend>,
) -> PipelineResult<RunSummary> {
    if !root.is_dir() {
        return Err(PipelineError::NotADirectory(root.to_path_buf()));
    }

    let files = filter_by_date(discover_files(root, &options.pattern)?, options.from, options.to);
    if files.is_empty() {
        return Err(PipelineError::NoFiles {
            root: root.to_path_buf(),
            pattern: options.pattern.clone(),
        });
    }
    tracing::info!(root = %root.display(), files = files.len(), "Discovered transcripts");

    let config_fp = config.fingerprint();
    let framework_fp = fingerprint_text(&framework.text);
    let old = if options.force {
        tracing::info!("Ignoring existing manifest");
        None
    } else {
        manifest::load(root)
    };

    let state = cache_state(old.as_ref(), &config_fp, &framework_fp);
    let split = partition(&files, old.as_ref(), &config_fp, &framework_fp);
    tracing::info!(
        to_process = split.to_process.len(),
        cached = split.cached.len(),
        cache = ?state,
        "Partitioned files"
    );

    let mut summary = RunSummary::new(root, state, options.dry_run);
    summary.cached = split.cached.keys().cloned().collect();

    if options.dry_run {
        summary.pending = split.to_process.iter().map(|p| file_key(p)).collect();
        summary.metrics.files_cached = split.cached.len();
        return Ok(summary);
    }

    let batch = if split.is_fully_cached() {
        tracing::info!("All files cached, nothing to extract");
        BatchResult::default()
    } else {
        let extractor = Arc::new(Extractor::new(backend, config));
        run_batch(&split.to_process, extractor, config.pipeline.max_workers).await
    };
    let BatchResult {
        decisions,
        failures,
        entries,
        participants,
        corrections,
        mut metrics,
    } = batch;

    summary.processed = entries.keys().cloned().collect();
    let reconciled = reconcile(
        decisions,
        &split.cached,
        old.as_ref(),
        entries,
        RunIdentity {
            output_file: options.output_file.clone(),
            config_fingerprint: config_fp,
            framework_fingerprint: framework_fp,
        },
    );

    summary.manifest_saved = match manifest::save(root, &reconciled.manifest) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Failed to save manifest, next run starts cold");
            false
        }
    };

    metrics.files_cached = split.cached.len();
    metrics.decisions_dropped += reconciled.dropped_cached;
    metrics.log_summary();

    summary.participants = report_participants(config, &participants, &reconciled.decisions);
    summary.decisions = reconciled.decisions;
    summary.failed = failures;
    summary.corrections = corrections;
    summary.metrics = metrics;
    Ok(summary)
}

/// Extract a single transcript without touching any manifest.
pub async fn process_file(
    path: &Path,
    config: &TrackerConfig,
    backend: Arc<dyn ExtractionBackend>,
) -> PipelineResult<BatchResult> {
    let extractor = Arc::new(Extractor::new(backend, config));
    let mut batch = run_batch(&[path.to_path_buf()], extractor, 1).await;
    if let Some(failure) = batch.failures.pop() {
        return Err(failure.error.into());
    }
    batch.metrics.log_summary();
    Ok(batch)
}
