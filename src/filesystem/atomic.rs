// src/filesystem/atomic.rs

//! Atomic file replacement
//!
//! Content is written to a temp file in the destination directory, flushed,
//! then renamed over the target. Readers see either the old file or the new
//! one. If anything fails before the rename, the temp file is removed and the
//! previous content stays in place.

use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Atomically replace `path` with `content`, creating parent directories
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Same directory as the target so the rename never crosses filesystems
    let mut temp = NamedTempFile::new_in(parent).map_err(|e| {
        Error::IoError(format!(
            "Failed to create temp file in {}: {}",
            parent.display(),
            e
        ))
    })?;

    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    // On error the NamedTempFile inside PersistError is dropped and deleted
    temp.persist(path).map_err(|e| {
        Error::IoError(format!("Failed to replace {}: {}", path.display(), e.error))
    })?;

    debug!("Atomically wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// Serialize `value` as pretty JSON with a trailing newline and write it atomically
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/c.json");

        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        fs::write(&path, b"old").unwrap();

        atomic_write(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file.txt");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_failed_persist_keeps_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        // A directory at the target path makes the rename fail
        let target = temp_dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), b"keep").unwrap();

        assert!(atomic_write(&target, b"data").is_err());
        assert_eq!(fs::read(target.join("keep.txt")).unwrap(), b"keep");

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_atomic_write_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("v.json");
        atomic_write_json(&path, &serde_json::json!({"a": 1})).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["a"], 1);
    }
}
