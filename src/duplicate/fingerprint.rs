//! Content fingerprinting
//!
//! A fingerprint is the MD5 digest of a bounded prefix of a file's bytes,
//! rendered as lowercase hex. Only the first `prefix_len` bytes are read, so
//! two files that agree on their prefix but differ later share a
//! fingerprint. That false-positive risk is accepted in exchange for reading
//! a few kilobytes instead of whole media files.
//!
//! The default prefix length and digest match the caches written by earlier
//! versions of the tool; changing either makes existing caches useless.

use crate::core::error::{Result, StoreError};
use md5::{Digest, Md5};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Number of leading bytes hashed when no other length is configured
pub const DEFAULT_PREFIX_LEN: usize = 10_000;

/// Result of fingerprinting one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Hex digest of the file prefix
    pub hash: String,
    /// Full file length from filesystem metadata
    pub size: u64,
}

/// Computes prefix fingerprints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprinter {
    prefix_len: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self {
            prefix_len: DEFAULT_PREFIX_LEN,
        }
    }
}

impl Fingerprinter {
    /// Create a fingerprinter hashing at most `prefix_len` bytes per file
    pub fn new(prefix_len: usize) -> Self {
        Self { prefix_len }
    }

    /// Number of bytes hashed per file
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// Fingerprint the file at `path`
    ///
    /// The size comes from `fs::metadata`, not from the bytes read.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let file = File::open(path).map_err(|e| StoreError::read(path, e))?;

        let mut prefix = Vec::with_capacity(self.prefix_len.min(64 * 1024));
        file.take(self.prefix_len as u64)
            .read_to_end(&mut prefix)
            .map_err(|e| StoreError::read(path, e))?;

        let size = fs::metadata(path)
            .map_err(|e| StoreError::read(path, e))?
            .len();

        Ok(Fingerprint {
            hash: compute_data_hash(&prefix),
            size,
        })
    }
}

/// Compute the hex MD5 digest of in-memory data
pub fn compute_data_hash(data: &[u8]) -> String {
    hash_to_hex(&Md5::digest(data))
}

/// Convert digest bytes to a lowercase hexadecimal string
pub fn hash_to_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compute_data_hash() {
        // Known MD5 of "Hello, World!"
        assert_eq!(
            compute_data_hash(b"Hello, World!"),
            "65a8e27d8879283831b664bd8b7f0ad4"
        );
    }

    #[test]
    fn test_empty_file_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.jpg");
        fs::write(&path, b"").unwrap();

        let fp = Fingerprinter::default().fingerprint(&path).unwrap();
        assert_eq!(fp.hash, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(fp.size, 0);
    }

    #[test]
    fn test_only_prefix_is_hashed() {
        let dir = TempDir::new().unwrap();
        let mut first = vec![7u8; DEFAULT_PREFIX_LEN];
        let mut second = first.clone();
        first.extend_from_slice(b"tail one");
        second.extend_from_slice(b"a much longer, different tail");

        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, &first).unwrap();
        fs::write(&b, &second).unwrap();

        let fingerprinter = Fingerprinter::default();
        let fa = fingerprinter.fingerprint(&a).unwrap();
        let fb = fingerprinter.fingerprint(&b).unwrap();

        assert_eq!(fa.hash, fb.hash);
        assert_eq!(fa.size, first.len() as u64);
        assert_eq!(fb.size, second.len() as u64);
    }

    #[test]
    fn test_prefix_difference_changes_hash() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"first bytes").unwrap();
        fs::write(&b, b"other bytes").unwrap();

        let fingerprinter = Fingerprinter::default();
        assert_ne!(
            fingerprinter.fingerprint(&a).unwrap().hash,
            fingerprinter.fingerprint(&b).unwrap().hash
        );
    }

    #[test]
    fn test_custom_prefix_len() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"abcdXXXX").unwrap();
        fs::write(&b, b"abcdYYYY").unwrap();

        let short = Fingerprinter::new(4);
        assert_eq!(short.prefix_len(), 4);
        assert_eq!(
            short.fingerprint(&a).unwrap(),
            Fingerprint {
                hash: compute_data_hash(b"abcd"),
                size: 8
            }
        );
        assert_eq!(
            short.fingerprint(&a).unwrap().hash,
            short.fingerprint(&b).unwrap().hash
        );
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = Fingerprinter::default()
            .fingerprint(&dir.path().join("missing.jpg"))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReadError { .. }));
    }
}
