//! Common test utilities for pipeline integration tests
//!
//! Temporary processing roots, decision builders and a fast config.

#![allow(dead_code)]

use groundtruth::{mock_response, AgreementValue, Decision, Significance, Status, TrackerConfig};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary processing root.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write (or overwrite) a transcript.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("write transcript");
        path
    }

    pub fn manifest_exists(&self) -> bool {
        groundtruth::manifest::manifest_path(self.root()).is_file()
    }
}

/// An Agreed decision everyone said yes to.
pub fn agreed(title: &str) -> Decision {
    Decision::new("Technical Architecture", Significance::new(2).unwrap(), Status::Agreed, title)
        .with_agreement("Ryan", AgreementValue::Yes)
        .with_agreement("Ajit", AgreementValue::Yes)
}

/// Backend response holding one decision titled `title`.
pub fn response_for(title: &str) -> String {
    mock_response(&[agreed(title)], &[])
}

/// Pinned participants, millisecond backoff.
pub fn fast_config() -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.set_explicit_participants(&["Ryan".to_string(), "Ajit".to_string()]);
    config.pipeline.base_delay_ms = 1;
    config.pipeline.max_workers = 4;
    config
}

pub fn titles(decisions: &[Decision]) -> Vec<String> {
    let mut titles: Vec<String> = decisions.iter().map(|d| d.title.clone()).collect();
    titles.sort();
    titles
}
