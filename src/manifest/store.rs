//! Persisted manifest: one `.groundtruth.json` per processing root

use super::fingerprint::Fingerprint;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version written by this build. Compared for exact equality.
pub const MANIFEST_VERSION: &str = "1.0";

/// File name of the manifest inside a processing root.
pub const MANIFEST_FILENAME: &str = ".groundtruth.json";

/// Errors raised while writing manifest state.
///
/// Loading never fails: an unreadable manifest is a cold start.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ManifestResult<T> = Result<T, ManifestError>;

/// Cached extraction state for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Fingerprint of the bytes at last successful processing
    #[serde(rename = "hash")]
    pub content_hash: Fingerprint,
    /// Diagnostic only
    pub size: u64,
    /// Diagnostic only, RFC 3339 UTC
    pub mtime: String,
    pub decisions_count: usize,
    /// Decisions in their serialized form, reused verbatim on a cache hit
    #[serde(default)]
    pub decisions: Vec<serde_json::Value>,
}

impl FileEntry {
    pub fn new(
        content_hash: Fingerprint,
        size: u64,
        mtime: impl Into<String>,
        decisions: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            content_hash,
            size,
            mtime: mtime.into(),
            decisions_count: decisions.len(),
            decisions,
        }
    }
}

/// Modification time as an RFC 3339 UTC string, empty when unavailable.
pub fn format_mtime(metadata: &std::fs::Metadata) -> String {
    metadata
        .modified()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default()
}

/// What was processed for one root, under which configuration, and the
/// cached results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "version")]
    pub schema_version: String,
    pub generated_at: String,
    /// Report artifact this manifest corresponds to
    pub output_file: String,
    #[serde(rename = "config_hash", default = "Fingerprint::empty")]
    pub config_fingerprint: Fingerprint,
    #[serde(rename = "framework_hash", default = "Fingerprint::empty")]
    pub framework_fingerprint: Fingerprint,
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,
}

impl Manifest {
    /// A fresh manifest stamped with the current time.
    pub fn new(
        output_file: impl Into<String>,
        config_fingerprint: Fingerprint,
        framework_fingerprint: Fingerprint,
        files: BTreeMap<String, FileEntry>,
    ) -> Self {
        Self {
            schema_version: MANIFEST_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            output_file: output_file.into(),
            config_fingerprint,
            framework_fingerprint,
            files,
        }
    }

    pub fn total_decisions(&self) -> usize {
        self.files.values().map(|e| e.decisions_count).sum()
    }
}

/// Path of the manifest for a processing root.
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILENAME)
}

/// Load the manifest for `root`.
///
/// Returns `None` when there is no manifest, when it cannot be read or
/// parsed, or when its schema version differs from [`MANIFEST_VERSION`].
pub fn load(root: &Path) -> Option<Manifest> {
    let path = manifest_path(root);
    if !path.exists() {
        return None;
    }

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read manifest");
            return None;
        }
    };

    // Check the version before the full decode so that a newer schema with
    // different fields reads as a mismatch, not as corruption.
    let version = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("version").and_then(|s| s.as_str()).map(str::to_string));
    match version.as_deref() {
        Some(MANIFEST_VERSION) => {}
        Some(other) => {
            tracing::warn!(found = other, expected = MANIFEST_VERSION, "Manifest version mismatch");
            return None;
        }
        None => {
            tracing::warn!(path = %path.display(), "Failed to load manifest: missing version");
            return None;
        }
    }

    match serde_json::from_str::<Manifest>(&text) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to load manifest");
            None
        }
    }
}

/// Write the manifest for `root`, replacing any previous one.
///
/// Writes a sibling temp file and renames it over the target.
pub fn save(root: &Path, manifest: &Manifest) -> ManifestResult<()> {
    let path = manifest_path(root);
    let tmp = root.join(format!("{}.tmp", MANIFEST_FILENAME));
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, &path)?;
    tracing::debug!(path = %path.display(), files = manifest.files.len(), "Saved manifest");
    Ok(())
}
