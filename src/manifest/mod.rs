//! Content-addressed cache of extraction results
//!
//! One manifest per processing root records, for every input file, the
//! fingerprint of its bytes and the decisions extracted from it, together
//! with the config and framework fingerprints in force at the time.

mod change;
mod fingerprint;
mod reconcile;
mod store;

pub use change::{cache_state, file_key, partition, CacheState, Partition};
pub use fingerprint::{fingerprint_bytes, fingerprint_file, fingerprint_text, Fingerprint};
pub use reconcile::{reconcile, Reconciled, RunIdentity};
pub use store::{
    format_mtime, load, manifest_path, save, FileEntry, Manifest, ManifestError, ManifestResult,
    MANIFEST_FILENAME, MANIFEST_VERSION,
};
