// src/ownership/cache.rs
//! Checksum caching for repeated classification
//!
//! Caches file checksums keyed by path and a metadata fingerprint (size, mtime
//! and, on Unix, inode and ctime) so a file that has not changed since it was
//! last hashed is not read again. mtime alone can be restored by `touch -r` or
//! `cp -p`; ctime cannot be set from userspace. The cache is an ordinary value
//! owned by whoever runs the classification; there is no process-wide
//! instance. Paths that may be overwritten are always hashed directly.

use crate::hash::Checksum;
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Maximum number of cached entries
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Metadata that changes whenever file content does
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    size: u64,
    modified: Option<SystemTime>,
    #[cfg(unix)]
    inode: (u64, u64),
    #[cfg(unix)]
    changed: (i64, i64),
}

impl Fingerprint {
    fn of(metadata: &Metadata) -> Self {
        #[cfg(unix)]
        use std::os::unix::fs::MetadataExt;

        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            #[cfg(unix)]
            inode: (metadata.dev(), metadata.ino()),
            #[cfg(unix)]
            changed: (metadata.ctime(), metadata.ctime_nsec()),
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    fingerprint: Fingerprint,
    checksum: Checksum,
}

impl CacheEntry {
    fn matches(&self, metadata: &Metadata) -> bool {
        self.fingerprint == Fingerprint::of(metadata)
    }
}

/// Thread-safe checksum cache
pub struct ChecksumCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ChecksumCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ChecksumCache {
    /// Create a cache holding at most `max_entries` paths
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached checksum for `path`, if its fingerprint still matches `metadata`
    pub fn get(&self, path: &Path, metadata: &Metadata) -> Option<Checksum> {
        let entries = self.entries.read().ok()?;

        match entries.get(path) {
            Some(entry) if entry.matches(metadata) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.checksum.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remember the checksum of `path` as observed with `metadata`
    pub fn insert(&self, path: &Path, metadata: &Metadata, checksum: Checksum) {
        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.max_entries && !entries.contains_key(path) {
                // No recency tracking; drop an arbitrary entry
                if let Some(victim) = entries.keys().next().cloned() {
                    entries.remove(&victim);
                }
            }

            entries.insert(
                path.to_path_buf(),
                CacheEntry {
                    fingerprint: Fingerprint::of(metadata),
                    checksum,
                },
            );
        }
    }

    /// Forget one path; call after rewriting it
    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(path);
        }
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().map(|e| e.len()).unwrap_or(0);
        CacheStats {
            entries,
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::checksum_bytes;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cache_insert_get() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"abc").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let cache = ChecksumCache::default();
        assert!(cache.get(&path, &metadata).is_none());

        cache.insert(&path, &metadata, checksum_bytes(b"abc"));
        assert_eq!(cache.get(&path, &metadata), Some(checksum_bytes(b"abc")));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_size_change_misses() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"abc").unwrap();

        let cache = ChecksumCache::default();
        cache.insert(&path, &fs::metadata(&path).unwrap(), checksum_bytes(b"abc"));

        fs::write(&path, b"abcdef").unwrap();
        assert!(cache.get(&path, &fs::metadata(&path).unwrap()).is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_restored_mtime_misses() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"abc").unwrap();
        let before = fs::metadata(&path).unwrap();

        let cache = ChecksumCache::default();
        cache.insert(&path, &before, checksum_bytes(b"abc"));

        // Same size, mtime put back afterwards
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(&path, b"xyz").unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(before.modified().unwrap())
            .unwrap();

        let after = fs::metadata(&path).unwrap();
        assert_eq!(after.len(), before.len());
        assert_eq!(after.modified().unwrap(), before.modified().unwrap());
        assert!(cache.get(&path, &after).is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let meta_a = fs::metadata(&a).unwrap();
        let meta_b = fs::metadata(&b).unwrap();

        let cache = ChecksumCache::default();
        cache.insert(&a, &meta_a, checksum_bytes(b"a"));
        cache.insert(&b, &meta_b, checksum_bytes(b"b"));

        cache.invalidate(&a);
        assert!(cache.get(&a, &meta_a).is_none());
        assert!(cache.get(&b, &meta_b).is_some());

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_capacity_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ChecksumCache::new(2);

        for i in 0..5 {
            let path = temp_dir.path().join(format!("{}.txt", i));
            fs::write(&path, i.to_string()).unwrap();
            let metadata = fs::metadata(&path).unwrap();
            cache.insert(&path, &metadata, checksum_bytes(i.to_string().as_bytes()));
        }

        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_caches_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"abc").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let first = ChecksumCache::default();
        let second = ChecksumCache::default();
        first.insert(&path, &metadata, checksum_bytes(b"abc"));

        assert!(second.get(&path, &metadata).is_none());
    }
}
