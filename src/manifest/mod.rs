// src/manifest/mod.rs

//! Per-kit manifest: which files a kit installed and what they looked like
//!
//! One manifest exists per installed kit, at `<kit_dir>/manifest.json`. It
//! maps each tracked relative path to the checksum the file had when the kit
//! last wrote it. The orchestrator is the only writer and always holds the
//! operation lock before calling [`save`].
//!
//! A missing manifest means a first install. A manifest that cannot be parsed
//! is treated the same way: every existing file then classifies as
//! user-owned, so nothing the user may have touched gets overwritten.

use crate::filesystem::atomic_write_json;
use crate::hash::Checksum;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the manifest inside a kit directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Who owns a file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// Installed by the kit and unchanged since
    #[serde(rename = "ck")]
    Kit,
    /// Installed by the kit, then edited locally
    #[serde(rename = "ck-modified")]
    KitModified,
    /// Not installed by the kit, or not tracked
    #[serde(rename = "user")]
    User,
}

impl Ownership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ownership::Kit => "ck",
            Ownership::KitModified => "ck-modified",
            Ownership::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ck" => Some(Ownership::Kit),
            "ck-modified" => Some(Ownership::KitModified),
            "user" => Some(Ownership::User),
            _ => None,
        }
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file tracked by a kit manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
    /// Relative path with `/` separators, unique within the manifest
    pub path: String,
    /// Content checksum as of the last install that wrote this path
    pub checksum: Checksum,
    /// Ownership recorded at the last install
    pub ownership: Ownership,
    /// Kit version that last wrote this path
    pub installed_version: String,
}

impl TrackedFile {
    pub fn new(
        path: impl Into<String>,
        checksum: Checksum,
        ownership: Ownership,
        installed_version: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            checksum,
            ownership,
            installed_version: installed_version.into(),
        }
    }
}

/// Settings identifiers a kit installed, used as the deletion baseline
///
/// A hook command or service name listed here but missing from the live
/// settings was removed by the user and must not be added back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledSettings {
    /// Normalized hook commands
    #[serde(default)]
    pub hook_commands: Vec<String>,
    /// Service names
    #[serde(default)]
    pub services: Vec<String>,
}

impl InstalledSettings {
    pub fn is_empty(&self) -> bool {
        self.hook_commands.is_empty() && self.services.is_empty()
    }
}

/// Record of one installed kit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub kit_id: String,
    pub installed_version: String,
    #[serde(default)]
    pub files: Vec<TrackedFile>,
    #[serde(default)]
    pub installed_settings: InstalledSettings,
    pub last_updated: DateTime<Utc>,
}

impl Manifest {
    /// Empty manifest for a first install
    pub fn new(kit_id: impl Into<String>, installed_version: impl Into<String>) -> Self {
        Self {
            kit_id: kit_id.into(),
            installed_version: installed_version.into(),
            files: Vec::new(),
            installed_settings: InstalledSettings::default(),
            last_updated: Utc::now(),
        }
    }

    /// Look up the tracked entry for a manifest key
    pub fn entry(&self, path: &str) -> Option<&TrackedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Insert or replace the entry for `file.path`
    pub fn upsert(&mut self, file: TrackedFile) {
        match self.files.iter_mut().find(|f| f.path == file.path) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }

    /// Remove the entry for a path, returning it
    pub fn remove(&mut self, path: &str) -> Option<TrackedFile> {
        let index = self.files.iter().position(|f| f.path == path)?;
        Some(self.files.remove(index))
    }

    /// Sort entries by path so saved manifests diff cleanly
    pub fn sort(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Path of the manifest file inside a kit directory
pub fn manifest_path(kit_dir: &Path) -> PathBuf {
    kit_dir.join(MANIFEST_FILE)
}

/// Reject kit ids that cannot be used as a single directory name
pub fn validate_kit_id(kit_id: &str) -> Result<()> {
    if kit_id.is_empty() {
        return Err(Error::InvalidPath("Empty kit id".to_string()));
    }
    if kit_id.contains('/') || kit_id.contains('\\') || kit_id == "." || kit_id == ".." {
        return Err(Error::PathTraversal(format!("Invalid kit id: {}", kit_id)));
    }
    Ok(())
}

/// Load the manifest from a kit directory
///
/// Returns `Ok(None)` when there is no manifest or when it cannot be parsed.
/// Other read failures are errors.
pub fn load(kit_dir: &Path) -> Result<Option<Manifest>> {
    let path = manifest_path(kit_dir);

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No manifest at {}", path.display());
            return Ok(None);
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!(
                "Manifest {} is not valid UTF-8, treating kit as not installed",
                path.display()
            );
            return Ok(None);
        }
        Err(e) => {
            return Err(Error::IoError(format!(
                "Failed to read manifest {}: {}",
                path.display(),
                e
            )));
        }
    };

    match serde_json::from_str::<Manifest>(&content) {
        Ok(manifest) => {
            debug!(
                "Loaded manifest for kit {} ({} files)",
                manifest.kit_id,
                manifest.files.len()
            );
            Ok(Some(manifest))
        }
        Err(e) => {
            warn!(
                "Ignoring malformed manifest {}: {}",
                path.display(),
                e
            );
            Ok(None)
        }
    }
}

/// Atomically write the manifest into a kit directory
///
/// Does not lock. On failure the previous manifest is left intact.
pub fn save(kit_dir: &Path, manifest: &Manifest) -> Result<()> {
    let path = manifest_path(kit_dir);
    atomic_write_json(&path, manifest)?;
    debug!(
        "Saved manifest for kit {} ({} files) to {}",
        manifest.kit_id,
        manifest.files.len(),
        path.display()
    );
    Ok(())
}

/// Delete the manifest of a kit directory, if present
pub fn remove(kit_dir: &Path) -> Result<bool> {
    let path = manifest_path(kit_dir);
    match fs::remove_file(&path) {
        Ok(()) => {
            // Leave the directory if something else lives there
            let _ = fs::remove_dir(kit_dir);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::IoError(format!(
            "Failed to remove manifest {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::checksum_bytes;
    use tempfile::TempDir;

    fn sample_manifest() -> Manifest {
        let mut manifest = Manifest::new("engineer", "1.4.0");
        manifest.upsert(TrackedFile::new(
            "hooks/init.js",
            checksum_bytes(b"init"),
            Ownership::Kit,
            "1.4.0",
        ));
        manifest.installed_settings.hook_commands =
            vec!["node $HOME/.claude/hooks/init.js".to_string()];
        manifest.installed_settings.services = vec!["docs".to_string()];
        manifest
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load(temp_dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let kit_dir = temp_dir.path().join("kits/engineer");
        let manifest = sample_manifest();

        save(&kit_dir, &manifest).unwrap();
        let loaded = load(&kit_dir).unwrap().unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_wire_format() {
        let manifest = sample_manifest();
        let value = serde_json::to_value(&manifest).unwrap();

        assert_eq!(value["kitId"], "engineer");
        assert_eq!(value["installedVersion"], "1.4.0");
        assert_eq!(value["files"][0]["ownership"], "ck");
        assert_eq!(value["files"][0]["installedVersion"], "1.4.0");
        assert!(
            value["files"][0]["checksum"]
                .as_str()
                .unwrap()
                .starts_with("sha256:")
        );
        assert_eq!(value["installedSettings"]["services"][0], "docs");
        assert!(value["lastUpdated"].is_string());
    }

    #[test]
    fn test_legacy_manifest_without_settings_baseline() {
        let temp_dir = TempDir::new().unwrap();
        let json = format!(
            r#"{{"kitId":"old","installedVersion":"0.9","files":[{{"path":"a.md","checksum":"{}","ownership":"ck-modified","installedVersion":"0.9"}}],"lastUpdated":"2025-01-01T00:00:00Z"}}"#,
            checksum_bytes(b"a")
        );
        fs::write(temp_dir.path().join(MANIFEST_FILE), json).unwrap();

        let manifest = load(temp_dir.path()).unwrap().unwrap();
        assert!(manifest.installed_settings.is_empty());
        assert_eq!(manifest.files[0].ownership, Ownership::KitModified);
    }

    #[test]
    fn test_malformed_manifest_is_none() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        assert!(load(temp_dir.path()).unwrap().is_none());

        fs::write(temp_dir.path().join(MANIFEST_FILE), r#"{"kitId": 3}"#).unwrap();
        assert!(load(temp_dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut manifest = sample_manifest();
        manifest.upsert(TrackedFile::new(
            "hooks/init.js",
            checksum_bytes(b"changed"),
            Ownership::KitModified,
            "1.5.0",
        ));
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(
            manifest.entry("hooks/init.js").unwrap().ownership,
            Ownership::KitModified
        );

        assert!(manifest.remove("hooks/init.js").is_some());
        assert!(manifest.entry("hooks/init.js").is_none());
        assert!(manifest.remove("hooks/init.js").is_none());
    }

    #[test]
    fn test_remove_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let kit_dir = temp_dir.path().join("engineer");
        save(&kit_dir, &sample_manifest()).unwrap();

        assert!(remove(&kit_dir).unwrap());
        assert!(!kit_dir.exists());
        assert!(!remove(&kit_dir).unwrap());
    }

    #[test]
    fn test_validate_kit_id() {
        assert!(validate_kit_id("engineer").is_ok());
        assert!(validate_kit_id("").is_err());
        assert!(validate_kit_id("../x").is_err());
        assert!(validate_kit_id("..").is_err());
    }

    #[test]
    fn test_ownership_strings() {
        for ownership in [Ownership::Kit, Ownership::KitModified, Ownership::User] {
            assert_eq!(Ownership::parse(ownership.as_str()), Some(ownership));
        }
        assert_eq!(Ownership::parse("pristine"), None);
    }
}
