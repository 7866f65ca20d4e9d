// src/ownership/mod.rs

//! Ownership classification of installed files
//!
//! Classification is a pure function of the bytes on disk and the manifest
//! entry for the path:
//!
//! | on disk | manifest entry | result |
//! |---|---|---|
//! | absent or unreadable | any | `user`, `exists = false` |
//! | present | none | `user` |
//! | present | checksum equal | `ck` |
//! | present | checksum differs | `ck-modified` |
//!
//! A file with no manifest entry is user-owned even when its bytes match what
//! the kit ships: only the kit's own record can establish ownership.

mod cache;

pub use cache::{CacheStats, ChecksumCache};

use crate::hash::{self, Checksum};
use crate::manifest::{Ownership, TrackedFile};
use crate::parallel::BoundedPool;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of classifying one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub ownership: Ownership,
    /// Whether the file could be read
    pub exists: bool,
    /// Checksum recorded in the manifest
    pub expected_checksum: Option<Checksum>,
    /// Checksum of the bytes on disk
    pub actual_checksum: Option<Checksum>,
}

impl ClassificationResult {
    fn absent(entry: Option<&TrackedFile>) -> Self {
        Self {
            ownership: Ownership::User,
            exists: false,
            expected_checksum: entry.map(|e| e.checksum.clone()),
            actual_checksum: None,
        }
    }
}

/// Classify one file against its manifest entry
pub fn classify(path: &Path, entry: Option<&TrackedFile>) -> ClassificationResult {
    classify_with_cache(path, entry, None)
}

/// Classify one file, reusing cached checksums for unchanged files
pub fn classify_with_cache(
    path: &Path,
    entry: Option<&TrackedFile>,
    cache: Option<&ChecksumCache>,
) -> ClassificationResult {
    let actual = match checksum_of(path, cache) {
        Ok(Some(checksum)) => checksum,
        Ok(None) => return ClassificationResult::absent(entry),
        Err(e) => {
            warn!("Cannot read {}, treating as absent: {}", path.display(), e);
            return ClassificationResult::absent(entry);
        }
    };

    let ownership = match entry {
        None => Ownership::User,
        Some(tracked) if tracked.checksum == actual => Ownership::Kit,
        Some(_) => Ownership::KitModified,
    };

    debug!("Classified {} as {}", path.display(), ownership);

    ClassificationResult {
        ownership,
        exists: true,
        expected_checksum: entry.map(|e| e.checksum.clone()),
        actual_checksum: Some(actual),
    }
}

/// Classify many files under the pool's concurrency limit
///
/// Results are in input order. Unreadable files come back as `exists = false`
/// rather than failing the batch.
pub fn classify_batch(
    pool: &BoundedPool,
    items: &[(PathBuf, Option<&TrackedFile>)],
    cache: Option<&ChecksumCache>,
) -> Vec<ClassificationResult> {
    pool.map(items, |(path, entry)| {
        classify_with_cache(path, *entry, cache)
    })
}

/// Checksum `path`, or `None` if it does not exist
fn checksum_of(path: &Path, cache: Option<&ChecksumCache>) -> io::Result<Option<Checksum>> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if !metadata.is_file() {
        return Err(io::Error::other(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    if let Some(cached) = cache.and_then(|c| c.get(path, &metadata)) {
        return Ok(Some(cached));
    }

    let checksum = hash::compute(path)?;
    if let Some(cache) = cache {
        cache.insert(path, &metadata, checksum.clone());
    }
    Ok(Some(checksum))
}
