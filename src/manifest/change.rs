//! Change detection: which files must be (re)extracted

use super::fingerprint::{fingerprint_file, Fingerprint};
use super::store::Manifest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Why the whole cache was bypassed, if it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No usable manifest
    Cold,
    ConfigChanged,
    FrameworkChanged,
    /// Per-file entries were consulted
    Warm,
}

/// Result of [`partition`].
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Files needing extraction, in input order
    pub to_process: Vec<PathBuf>,
    /// File name → cached serialized decisions
    pub cached: BTreeMap<String, Vec<serde_json::Value>>,
}

impl Partition {
    pub fn is_fully_cached(&self) -> bool {
        self.to_process.is_empty()
    }
}

/// The name a file is tracked under in the manifest.
pub fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Decide whether the manifest can be consulted at all.
pub fn cache_state(
    manifest: Option<&Manifest>,
    config_fp: &Fingerprint,
    framework_fp: &Fingerprint,
) -> CacheState {
    match manifest {
        None => CacheState::Cold,
        Some(m) if m.config_fingerprint != *config_fp => CacheState::ConfigChanged,
        Some(m) if m.framework_fingerprint != *framework_fp => CacheState::FrameworkChanged,
        Some(_) => CacheState::Warm,
    }
}

/// Split `files` into those needing extraction and those served from cache.
///
/// A changed config or framework fingerprint invalidates every entry. Only
/// file bytes are read; a file that cannot be fingerprinted is sent for
/// processing, where the read failure is reported against that file.
pub fn partition(
    files: &[PathBuf],
    manifest: Option<&Manifest>,
    config_fp: &Fingerprint,
    framework_fp: &Fingerprint,
) -> Partition {
    let state = cache_state(manifest, config_fp, framework_fp);
    let manifest = match (state, manifest) {
        (CacheState::Warm, Some(m)) => m,
        _ => {
            match state {
                CacheState::ConfigChanged => tracing::info!("Config changed, reprocessing all files"),
                CacheState::FrameworkChanged => {
                    tracing::info!("Framework changed, reprocessing all files")
                }
                _ => tracing::debug!("No usable manifest, processing all files"),
            }
            return Partition {
                to_process: files.to_vec(),
                cached: BTreeMap::new(),
            };
        }
    };

    let mut result = Partition::default();
    for path in files {
        let name = file_key(path);
        let Some(entry) = manifest.files.get(&name) else {
            tracing::debug!(file = %name, "New file");
            result.to_process.push(path.clone());
            continue;
        };

        match fingerprint_file(path) {
            Ok(current) if current == entry.content_hash => {
                tracing::debug!(file = %name, "Unchanged, using cache");
                result.cached.insert(name, entry.decisions.clone());
            }
            Ok(_) => {
                tracing::debug!(file = %name, "Content changed");
                result.to_process.push(path.clone());
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Cannot fingerprint file");
                result.to_process.push(path.clone());
            }
        }
    }

    result
}
