// src/hash.rs

//! Checksum engine for file ownership detection
//!
//! Checksums are an equality oracle: two files are "the same" for ownership
//! purposes when their SHA-256 digests match. Checksums are persisted in the
//! manifest as prefixed strings (`sha256:<hex>`), which leaves room for a
//! different algorithm later without breaking old manifests.
//!
//! Batch computation runs under the bounded worker pool from
//! [`crate::parallel`], preserving input order and stopping at the first
//! unreadable file.

use crate::parallel::BoundedPool;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-256 (256-bit cryptographic hash)
    #[default]
    Sha256,
}

impl HashAlgorithm {
    /// Get the hash output length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
        }
    }

    /// Get the hash output length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        self.output_len() * 2
    }

    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            _ => Err(ChecksumError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Checksum parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid checksum length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid hex in checksum: {0}")]
    InvalidHex(String),
}

/// A content checksum with its algorithm
///
/// Serialized as `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    value: String,
}

impl Checksum {
    /// Create a checksum from a hex digest, validating length and characters
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Result<Self, ChecksumError> {
        let value = value.into();
        let expected_len = algorithm.hex_len();

        if value.len() != expected_len {
            return Err(ChecksumError::InvalidLength {
                expected: expected_len,
                got: value.len(),
            });
        }

        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::InvalidHex(value));
        }

        Ok(Self {
            algorithm,
            value: value.to_lowercase(),
        })
    }

    /// Parse a prefixed checksum (`sha256:abc...`). Unprefixed digests are SHA-256.
    pub fn parse_prefixed(s: &str) -> Result<Self, ChecksumError> {
        match s.split_once(':') {
            Some((algo, digest)) => Self::new(algo.parse()?, digest),
            None => Self::new(HashAlgorithm::Sha256, s),
        }
    }

    /// Format as a prefixed string
    pub fn to_prefixed_string(&self) -> String {
        format!("{}:{}", self.algorithm.name(), self.value)
    }

    /// The algorithm this checksum was computed with
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The hex digest without prefix
    #[inline]
    pub fn as_hex(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefixed_string())
    }
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_prefixed(s)
    }
}

impl Serialize for Checksum {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_prefixed_string())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_prefixed(&s).map_err(serde::de::Error::custom)
    }
}

/// Checksum a byte slice
pub fn checksum_bytes(data: &[u8]) -> Checksum {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Checksum {
        algorithm: HashAlgorithm::Sha256,
        value: hex::encode(hasher.finalize()),
    }
}

/// Checksum everything a reader yields
pub fn checksum_reader<R: Read>(reader: &mut R) -> io::Result<Checksum> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(Checksum {
        algorithm: HashAlgorithm::Sha256,
        value: hex::encode(hasher.finalize()),
    })
}

/// Compute the checksum of a file's raw bytes
///
/// Streams the file so large files are not loaded into memory. An unreadable
/// file is an I/O error; callers decide what "unknown state" means for them.
pub fn compute(path: &Path) -> io::Result<Checksum> {
    let mut file = File::open(path)?;
    checksum_reader(&mut file)
}

/// Compute checksums for many files under a bounded worker pool
///
/// Results are in input order. The first unreadable file fails the batch.
pub fn compute_batch(pool: &BoundedPool, paths: &[PathBuf]) -> crate::Result<Vec<Checksum>> {
    pool.try_map(paths, |path| {
        compute(path).map_err(|e| {
            crate::Error::IoError(format!("Failed to checksum {}: {}", path.display(), e))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_sha256() {
        let checksum = checksum_bytes(b"Hello, World!");
        assert_eq!(
            checksum.as_hex(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        assert_eq!(
            checksum.to_string(),
            "sha256:dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_compute_matches_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        std::fs::write(&path, b"line1\n\nline3").unwrap();

        let from_file = compute(&path).unwrap();
        assert_eq!(from_file, checksum_bytes(b"line1\n\nline3"));
    }

    #[test]
    fn test_compute_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        std::fs::write(&path, b"same bytes").unwrap();

        assert_eq!(compute(&path).unwrap(), compute(&path).unwrap());
    }

    #[test]
    fn test_compute_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = compute(&temp_dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_parse_prefixed() {
        let hex = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";
        let prefixed: Checksum = format!("sha256:{}", hex).parse().unwrap();
        let bare: Checksum = hex.parse().unwrap();
        assert_eq!(prefixed, bare);

        assert!(matches!(
            Checksum::parse_prefixed("md5:abc"),
            Err(ChecksumError::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            Checksum::parse_prefixed("sha256:abc"),
            Err(ChecksumError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_uppercase_digest_normalized() {
        let upper = "DFFD6021BB2BD5B0AF676290809EC3A53191DD81C7F70A4B28688A362182986F";
        let checksum = Checksum::new(HashAlgorithm::Sha256, upper).unwrap();
        assert_eq!(checksum, checksum_bytes(b"Hello, World!"));
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let checksum = checksum_bytes(b"abc");
        let json = serde_json::to_string(&checksum).unwrap();
        assert!(json.starts_with("\"sha256:"));
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checksum);
    }

    #[test]
    fn test_compute_batch_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..20 {
            let path = temp_dir.path().join(format!("f{}.txt", i));
            std::fs::write(&path, format!("content {}", i)).unwrap();
            paths.push(path);
        }

        let pool = BoundedPool::new(4).unwrap();
        let checksums = compute_batch(&pool, &paths).unwrap();
        for (i, checksum) in checksums.iter().enumerate() {
            assert_eq!(*checksum, checksum_bytes(format!("content {}", i).as_bytes()));
        }
    }

    #[test]
    fn test_compute_batch_fails_on_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.txt");
        std::fs::write(&good, b"ok").unwrap();
        let paths = vec![good, temp_dir.path().join("missing.txt")];

        let pool = BoundedPool::new(2).unwrap();
        assert!(compute_batch(&pool, &paths).is_err());
    }
}
