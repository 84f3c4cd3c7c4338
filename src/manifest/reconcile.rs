//! Merging fresh and cached results into one decision list and manifest

use super::fingerprint::Fingerprint;
use super::store::{FileEntry, Manifest};
use crate::decision::{decode_decisions, Decision};
use std::collections::BTreeMap;

/// Fingerprints and naming for the manifest being produced.
#[derive(Debug, Clone)]
pub struct RunIdentity {
    pub output_file: String,
    pub config_fingerprint: Fingerprint,
    pub framework_fingerprint: Fingerprint,
}

/// Combined output of a run.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Fresh decisions first, then cached ones in file-name order
    pub decisions: Vec<Decision>,
    pub manifest: Manifest,
    /// Cached records that no longer decode
    pub dropped_cached: usize,
}

/// Merge fresh results with cache hits.
///
/// The new manifest holds `new_entries` for freshly processed files and,
/// for every file served from cache, the old entry copied unchanged. Files
/// that failed this run appear in neither and are retried next run.
pub fn reconcile(
    fresh: Vec<Decision>,
    cached: &BTreeMap<String, Vec<serde_json::Value>>,
    old_manifest: Option<&Manifest>,
    new_entries: BTreeMap<String, FileEntry>,
    identity: RunIdentity,
) -> Reconciled {
    let mut decisions = fresh;
    let mut dropped_cached = 0;
    let mut files = new_entries;

    for (name, raw) in cached {
        let (restored, dropped) = decode_decisions(raw);
        if dropped > 0 {
            tracing::warn!(file = %name, dropped, "Dropped unreadable cached decisions");
        }
        dropped_cached += dropped;
        decisions.extend(restored);

        match old_manifest.and_then(|m| m.files.get(name)) {
            Some(entry) => {
                files.entry(name.clone()).or_insert_with(|| entry.clone());
            }
            None => tracing::warn!(file = %name, "Cached file has no manifest entry"),
        }
    }

    let manifest = Manifest::new(
        identity.output_file,
        identity.config_fingerprint,
        identity.framework_fingerprint,
        files,
    );

    Reconciled {
        decisions,
        manifest,
        dropped_cached,
    }
}
