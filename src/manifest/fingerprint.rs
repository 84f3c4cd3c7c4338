//! Content fingerprints used as cache keys
//!
//! A fingerprint is `sha256:<hex digest>`. Empty text maps to the
//! `sha256:empty` sentinel instead of the digest of zero bytes, so
//! "nothing configured" never collides with a computed hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const PREFIX: &str = "sha256:";
const EMPTY_SENTINEL: &str = "sha256:empty";
const CHUNK_SIZE: usize = 8192;

/// A stable content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The designated fingerprint for empty text.
    pub fn empty() -> Self {
        Self(EMPTY_SENTINEL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.0 == EMPTY_SENTINEL
    }

    fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{}{:x}", PREFIX, hasher.finalize()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint raw bytes. Metadata plays no part.
pub fn fingerprint_bytes(content: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(content);
    Fingerprint::from_hasher(hasher)
}

/// Fingerprint text. Empty text yields [`Fingerprint::empty`].
pub fn fingerprint_text(text: &str) -> Fingerprint {
    if text.is_empty() {
        return Fingerprint::empty();
    }
    fingerprint_bytes(text.as_bytes())
}

/// Fingerprint a file's bytes, reading in chunks.
///
/// Produces the same value as [`fingerprint_bytes`] over the whole content.
pub fn fingerprint_file(path: &Path) -> std::io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(Fingerprint::from_hasher(hasher))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_give_identical_fingerprints() {
        assert_eq!(fingerprint_bytes(b"hello world"), fingerprint_bytes(b"hello world"));
    }

    #[test]
    fn different_bytes_give_different_fingerprints() {
        assert_ne!(fingerprint_bytes(b"hello"), fingerprint_bytes(b"world"));
    }

    #[test]
    fn fingerprint_has_prefix_and_hex_digest() {
        let fp = fingerprint_bytes(b"test content");
        assert!(fp.as_str().starts_with("sha256:"));
        assert_eq!(fp.as_str().len(), 7 + 64);
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            fingerprint_text("abc").as_str(),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_text_uses_sentinel() {
        let fp = fingerprint_text("");
        assert_eq!(fp, Fingerprint::empty());
        assert!(fp.is_empty_sentinel());
        // zero bytes hashed directly is a real digest, not the sentinel
        assert_ne!(fingerprint_bytes(b""), Fingerprint::empty());
    }

    #[test]
    fn file_fingerprint_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        // larger than one chunk
        let content = "x".repeat(CHUNK_SIZE * 3 + 17);
        std::fs::write(&path, &content).unwrap();

        assert_eq!(
            fingerprint_file(&path).unwrap(),
            fingerprint_bytes(content.as_bytes())
        );
    }

    #[test]
    fn missing_file_propagates_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fingerprint_file(&dir.path().join("nope.txt")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
