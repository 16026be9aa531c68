//! Content fingerprinting
//!
//! A [`Fingerprint`] is the SHA-256 digest of exact file bytes in the
//! canonical `sha256:<hex>` form. The same form is used everywhere content
//! identity matters: detecting local edits since install, detecting whether
//! newly fetched content differs from previously fetched content, and
//! integrity-checking target-surface writes.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// A content-derived digest in canonical `sha256:<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{PREFIX}{:x}", hasher.finalize()))
    }

    /// Fingerprint the whole content of a file.
    ///
    /// Whole-file digesting is sufficient at the scale these artifacts have;
    /// no streaming is needed.
    pub fn of_file(path: &Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| crate::Error::io(path, e))?;
        Ok(Self::of_bytes(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_digest() {
        let fp = Fingerprint::of_bytes(b"hello world");
        assert_eq!(
            fp.as_str(),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn identical_bytes_identical_fingerprint() {
        assert_eq!(Fingerprint::of_bytes(b"abc"), Fingerprint::of_bytes(b"abc"));
    }

    #[test]
    fn different_bytes_different_fingerprint() {
        assert_ne!(Fingerprint::of_bytes(b"aaa"), Fingerprint::of_bytes(b"bbb"));
    }

    #[test]
    fn file_and_bytes_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Style guide\n").unwrap();

        assert_eq!(
            Fingerprint::of_file(&path).unwrap(),
            Fingerprint::of_bytes(b"# Style guide\n")
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let fp = Fingerprint::of_bytes(b"x");
        let json = serde_json::to_string(&fp).unwrap();
        assert!(json.starts_with("\"sha256:"));
    }
}
