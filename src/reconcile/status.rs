// src/reconcile/status.rs

//! Read-only status and uninstall

use super::{Reconciler, UPDATE_LOCK};
use super::summary::{FileStatus, KitStatus, UninstallSummary};
use crate::filesystem::safe_join;
use crate::lock::OperationLock;
use crate::manifest::{self, Ownership, TrackedFile};
use crate::ownership::classify_batch;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl Reconciler {
    /// Current ownership of every file an installed kit tracks
    ///
    /// Returns `None` when the kit is not installed. Takes no lock and writes
    /// nothing.
    pub fn status(&self, kit_id: &str) -> Result<Option<KitStatus>> {
        manifest::validate_kit_id(kit_id)?;

        let Some(manifest) = manifest::load(&self.layout.kit_dir(kit_id))? else {
            return Ok(None);
        };

        let items = self.tracked_targets(&manifest.files)?;
        let classes = classify_batch(&self.pool, &items, Some(&self.cache));

        let files = manifest
            .files
            .iter()
            .zip(classes)
            .map(|(file, class)| FileStatus {
                path: file.path.clone(),
                ownership: class.ownership,
                exists: class.exists,
            })
            .collect();

        Ok(Some(KitStatus {
            kit_id: manifest.kit_id,
            installed_version: manifest.installed_version,
            last_updated: manifest.last_updated.to_rfc3339(),
            files,
        }))
    }

    /// Kit ids with a manifest under this target, sorted
    pub fn installed_kits(&self) -> Result<Vec<String>> {
        let kits_dir = self.layout.kits_dir();
        let entries = match fs::read_dir(&kits_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut kits = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !manifest::manifest_path(&entry.path()).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                kits.push(name.to_string());
            }
        }
        kits.sort();
        Ok(kits)
    }

    /// Remove an installed kit
    ///
    /// Pristine files are deleted, locally edited ones stay where they are.
    /// Settings entries the kit added are left alone. The manifest goes last.
    pub fn uninstall(&self, kit_id: &str) -> Result<UninstallSummary> {
        manifest::validate_kit_id(kit_id)?;

        let lock = OperationLock::acquire(
            &self.layout.locks_dir(),
            UPDATE_LOCK,
            self.config.lock_stale_after(),
        )?;

        let kit_dir = self.layout.kit_dir(kit_id);
        let manifest = manifest::load(&kit_dir)?
            .ok_or_else(|| Error::NotFound(format!("kit {} is not installed", kit_id)))?;

        let items = self.tracked_targets(&manifest.files)?;
        let classes = classify_batch(&self.pool, &items, None);

        let mut summary = UninstallSummary {
            kit_id: kit_id.to_string(),
            ..Default::default()
        };

        for ((file, (target, _)), class) in manifest.files.iter().zip(&items).zip(classes) {
            if !class.exists {
                summary.missing.push(file.path.clone());
                continue;
            }

            match class.ownership {
                Ownership::Kit => {
                    fs::remove_file(target).map_err(|e| {
                        Error::IoError(format!("Failed to remove {}: {}", target.display(), e))
                    })?;
                    self.cache.invalidate(target);
                    remove_empty_parents(target, self.layout.target());
                    debug!("Removed {}", file.path);
                    summary.removed.push(file.path.clone());
                }
                Ownership::KitModified | Ownership::User => {
                    info!("Keeping locally edited {}", file.path);
                    summary.kept.push(file.path.clone());
                }
            }
        }

        manifest::remove(&kit_dir)?;
        if let Err(e) = fs::remove_dir(&kit_dir)
            && e.kind() != io::ErrorKind::NotFound
        {
            debug!("Leaving kit directory {}: {}", kit_dir.display(), e);
        }

        lock.release()?;

        info!(
            "Uninstalled kit {}: {} removed, {} kept",
            kit_id,
            summary.removed.len(),
            summary.kept.len()
        );
        Ok(summary)
    }

    fn tracked_targets<'a>(
        &self,
        files: &'a [TrackedFile],
    ) -> Result<Vec<(PathBuf, Option<&'a TrackedFile>)>> {
        files
            .iter()
            .map(|f| Ok((safe_join(self.layout.target(), &f.path)?, Some(f))))
            .collect()
    }
}

/// Remove directories left empty by a deletion, stopping at `root`
fn remove_empty_parents(path: &Path, root: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        match fs::remove_dir(dir) {
            Ok(()) => debug!("Removed empty directory {}", dir.display()),
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => break,
            Err(e) => {
                warn!("Could not remove directory {}: {}", dir.display(), e);
                break;
            }
        }
        current = dir.parent();
    }
}
