//! Incremental extraction pipeline
//!
//! Change detection decides which transcripts need extraction; the
//! scheduler fans those out to the backend under a worker limit; the
//! reconciler folds fresh and cached results into one output and manifest.

mod extract;
mod metrics;
mod run;
mod scheduler;

pub use extract::{date_in_name, ExtractError, Extracted, Extractor, FileExtractor};
pub use metrics::Metrics;
pub use run::{
    discover_files, filter_by_date, process_file, process_root, report_participants,
    PipelineError, PipelineResult, RunOptions, RunSummary, DEFAULT_PATTERN,
};
pub use scheduler::{run_batch, BatchResult, FileFailure};
