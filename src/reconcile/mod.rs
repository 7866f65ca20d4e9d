// src/reconcile/mod.rs

//! Reconciliation orchestrator
//!
//! One update run, in order:
//!
//! 1. Take the `update` lock for the install target
//! 2. Load the kit's manifest (absent on first install) and the live settings
//!    document (a malformed one stops the run before anything is written)
//! 3. Classify every shipped file against the manifest
//! 4. Per file: install absent files, overwrite pristine ones, leave
//!    user-owned ones alone, and offer a hunk merge for locally edited ones
//!    (or preserve them under protected paths)
//! 5. Merge the kit's settings fragment into the live settings
//! 6. Save settings, then the manifest, each atomically
//!
//! If the manifest save fails after files were rewritten, the next run sees
//! checksum mismatches on those files and treats them as locally edited, so
//! the failure mode is "ask again", never "overwrite silently".

mod diff;
mod status;
mod summary;

pub use diff::diff_file;
pub use summary::{
    FileAction, FileOutcome, FileStatus, KitStatus, MergeStats, ReconcileSummary,
    UninstallSummary,
};

use crate::config::Config;
use crate::filesystem::{atomic_write, is_under_any, relative_key, safe_join};
use crate::hash::{self, Checksum};
use crate::hunk::{self, HunkReviewer};
use crate::lock::OperationLock;
use crate::manifest::{self, Manifest, Ownership, TrackedFile};
use crate::ownership::{ChecksumCache, ClassificationResult, classify_batch};
use crate::parallel::BoundedPool;
use crate::settings::{self, SettingsDocument};
use crate::{Error, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name of the lock every mutating operation takes
pub const UPDATE_LOCK: &str = "update";

/// Directory under the home or project root that kits install into
pub const INSTALL_DIR: &str = ".claude";

/// Where a kit is installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallScope {
    /// Machine-wide, under the user's home directory
    Global,
    /// Per project, under the given project root
    Project(PathBuf),
}

impl InstallScope {
    /// Install target directory for this scope
    pub fn target_dir(&self) -> Result<PathBuf> {
        match self {
            InstallScope::Global => dirs::home_dir()
                .map(|home| home.join(INSTALL_DIR))
                .ok_or_else(|| Error::NotFound("home directory".to_string())),
            InstallScope::Project(root) => Ok(root.join(INSTALL_DIR)),
        }
    }
}

/// Paths the engine uses under one install target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    target: PathBuf,
    state_dir: PathBuf,
    settings_path: PathBuf,
}

impl Layout {
    pub fn new(target: impl Into<PathBuf>, config: &Config) -> Self {
        let target = target.into();
        Self {
            state_dir: target.join(&config.state_dir),
            settings_path: target.join(&config.settings_file),
            target,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }

    pub fn kits_dir(&self) -> PathBuf {
        self.state_dir.join("kits")
    }

    pub fn kit_dir(&self, kit_id: &str) -> PathBuf {
        self.kits_dir().join(kit_id)
    }
}

/// New kit content to reconcile into the target
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub kit_id: String,
    pub version: String,
    /// Materialized kit content
    pub source_dir: PathBuf,
    /// Settings fragment; read from the source directory when `None`
    pub settings: Option<SettingsDocument>,
}

impl ReconcileRequest {
    pub fn new(
        kit_id: impl Into<String>,
        version: impl Into<String>,
        source_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kit_id: kit_id.into(),
            version: version.into(),
            source_dir: source_dir.into(),
            settings: None,
        }
    }

    pub fn with_settings(mut self, settings: SettingsDocument) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// A shipped file paired with what is on disk
struct ShippedFile {
    key: String,
    source: PathBuf,
    target: PathBuf,
    checksum: Checksum,
    classification: ClassificationResult,
}

/// The reconciliation engine for one install target
pub struct Reconciler {
    config: Config,
    layout: Layout,
    pool: BoundedPool,
    cache: ChecksumCache,
}

impl Reconciler {
    pub fn new(target: impl Into<PathBuf>, config: Config) -> Result<Self> {
        config.validate()?;
        let pool = BoundedPool::new(config.concurrency)?;
        Ok(Self {
            layout: Layout::new(target, &config),
            config,
            pool,
            cache: ChecksumCache::default(),
        })
    }

    /// Reconciler for an install scope
    pub fn for_scope(scope: &InstallScope, config: Config) -> Result<Self> {
        Self::new(scope.target_dir()?, config)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &ChecksumCache {
        &self.cache
    }

    /// Run one update
    ///
    /// Locally edited files are merged through `reviewer`. Without one they
    /// are reported as unresolved and left untouched.
    pub fn reconcile(
        &self,
        request: &ReconcileRequest,
        mut reviewer: Option<&mut dyn HunkReviewer>,
    ) -> Result<ReconcileSummary> {
        manifest::validate_kit_id(&request.kit_id)?;
        if !request.source_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "kit source directory {}",
                request.source_dir.display()
            )));
        }

        let lock = OperationLock::acquire(
            &self.layout.locks_dir(),
            UPDATE_LOCK,
            self.config.lock_stale_after(),
        )?;

        let kit_dir = self.layout.kit_dir(&request.kit_id);
        let previous = manifest::load(&kit_dir)?;
        let live_settings = SettingsDocument::load(self.layout.settings_path())?;
        let fragment = match &request.settings {
            Some(doc) => doc.clone(),
            None => SettingsDocument::load(&request.source_dir.join(&self.config.settings_file))?,
        };

        info!(
            "Reconciling kit {} {} into {} ({})",
            request.kit_id,
            request.version,
            self.layout.target().display(),
            match &previous {
                Some(m) => format!("previously {}", m.installed_version),
                None => "first install".to_string(),
            }
        );

        let shipped = self.scan_shipped(request, previous.as_ref())?;

        let mut next = previous
            .clone()
            .unwrap_or_else(|| Manifest::new(&request.kit_id, &request.version));
        next.kit_id = request.kit_id.clone();
        next.installed_version = request.version.clone();

        let mut outcomes = Vec::with_capacity(shipped.len());
        let mut to_write = Vec::new();
        let mut to_merge = Vec::new();

        for file in &shipped {
            match self.plan(file, &request.version) {
                Planned::Done(outcome, entry) => {
                    if let Some(entry) = entry {
                        next.upsert(entry);
                    }
                    outcomes.push((file.key.clone(), outcome));
                }
                Planned::Write(action) => to_write.push((file, action)),
                Planned::Merge => to_merge.push(file),
            }
        }

        // Plain installs and overwrites run in parallel; the first failure
        // stops the run before settings or manifest are touched
        let written = self.pool.try_map(&to_write, |(file, action)| {
            let checksum = install_file(&file.source, &file.target)?;
            self.cache.invalidate(&file.target);
            Ok((file.key.clone(), *action, file.classification.ownership, checksum))
        })?;
        for (key, action, ownership, checksum) in written {
            debug!("{} {}", action.as_str(), key);
            next.upsert(TrackedFile::new(
                key.as_str(),
                checksum,
                Ownership::Kit,
                request.version.as_str(),
            ));
            outcomes.push((key.clone(), FileOutcome::new(&key, ownership, action)));
        }

        // Merges are interactive and strictly sequential
        for file in to_merge {
            let outcome = match reviewer.as_deref_mut() {
                Some(reviewer) => self.merge_file(file, reviewer, &mut next, &request.version)?,
                None => conflict_outcome(file, "no interactive reviewer available"),
            };
            outcomes.push((file.key.clone(), outcome));
        }

        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        let files: Vec<FileOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

        let baseline = previous
            .as_ref()
            .map(|m| m.installed_settings.clone())
            .unwrap_or_default();
        let merge = settings::merge_settings(&fragment, &live_settings, &request.kit_id, &baseline);
        next.installed_settings =
            settings::union_baseline(&baseline, &settings::installed_identifiers(&fragment));

        if merge.merged_document.to_value() != live_settings.to_value() {
            merge.merged_document.save(self.layout.settings_path())?;
            debug!("Saved settings to {}", self.layout.settings_path().display());
        }

        next.last_updated = Utc::now();
        next.sort();
        manifest::save(&kit_dir, &next)?;

        lock.release()?;

        let unresolved: Vec<String> = files
            .iter()
            .filter(|f| matches!(f.action, FileAction::Conflict))
            .map(|f| f.path.clone())
            .collect();
        if !unresolved.is_empty() {
            warn!(
                "{} locally edited file(s) of kit {} were not merged",
                unresolved.len(),
                request.kit_id
            );
        }

        Ok(ReconcileSummary {
            kit_id: request.kit_id.clone(),
            version: request.version.clone(),
            previous_version: previous.map(|m| m.installed_version),
            files,
            settings: merge,
            unresolved,
        })
    }

    /// Enumerate shipped files and classify their install locations
    fn scan_shipped(
        &self,
        request: &ReconcileRequest,
        previous: Option<&Manifest>,
    ) -> Result<Vec<ShippedFile>> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&request.source_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::IoError(format!(
                    "Failed to read kit source {}: {}",
                    request.source_dir.display(),
                    e
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let key = relative_key(&request.source_dir, entry.path())?;
            if key == self.config.settings_file || is_under_any(&key, &[self.config.state_dir.clone()]) {
                continue;
            }
            keys.push(key);
        }

        let sources: Vec<PathBuf> = keys.iter().map(|k| request.source_dir.join(k)).collect();
        let checksums = hash::compute_batch(&self.pool, &sources)?;

        let targets = keys
            .iter()
            .map(|k| safe_join(self.layout.target(), k))
            .collect::<Result<Vec<_>>>()?;
        let items: Vec<(PathBuf, Option<&TrackedFile>)> = keys
            .iter()
            .zip(&targets)
            .map(|(k, t)| (t.clone(), previous.and_then(|m| m.entry(k))))
            .collect();
        // Always hash before deciding whether to overwrite
        let classifications = classify_batch(&self.pool, &items, None);

        Ok(keys
            .into_iter()
            .zip(sources)
            .zip(targets)
            .zip(checksums)
            .zip(classifications)
            .map(|((((key, source), target), checksum), classification)| ShippedFile {
                key,
                source,
                target,
                checksum,
                classification,
            })
            .collect())
    }

    /// Decide what to do with one shipped file
    fn plan(&self, file: &ShippedFile, version: &str) -> Planned {
        let class = &file.classification;

        if !class.exists {
            if file.target.symlink_metadata().is_ok() {
                // Present but unreadable or not a regular file
                let outcome = FileOutcome::new(&file.key, Ownership::User, FileAction::SkippedUser)
                    .with_detail("exists but could not be read");
                return Planned::Done(outcome, None);
            }
            return Planned::Write(FileAction::Installed);
        }

        match class.ownership {
            Ownership::User => Planned::Done(
                FileOutcome::new(&file.key, Ownership::User, FileAction::SkippedUser),
                None,
            ),
            Ownership::Kit => {
                if class.actual_checksum.as_ref() == Some(&file.checksum) {
                    Planned::Done(
                        FileOutcome::new(&file.key, Ownership::Kit, FileAction::Unchanged),
                        None,
                    )
                } else {
                    Planned::Write(FileAction::Updated)
                }
            }
            Ownership::KitModified => {
                if class.actual_checksum.as_ref() == Some(&file.checksum) {
                    let entry = TrackedFile::new(
                        file.key.as_str(),
                        file.checksum.clone(),
                        Ownership::Kit,
                        version,
                    );
                    Planned::Done(
                        FileOutcome::new(&file.key, Ownership::KitModified, FileAction::AlreadyCurrent),
                        Some(entry),
                    )
                } else if is_under_any(&file.key, &self.config.protected_paths) {
                    info!("Preserving locally edited {}", file.key);
                    Planned::Done(
                        FileOutcome::new(&file.key, Ownership::KitModified, FileAction::Preserved),
                        None,
                    )
                } else {
                    Planned::Merge
                }
            }
        }
    }

    /// Hunk-merge one locally edited file
    fn merge_file(
        &self,
        file: &ShippedFile,
        reviewer: &mut dyn HunkReviewer,
        manifest: &mut Manifest,
        version: &str,
    ) -> Result<FileOutcome> {
        let installed = fs::read(&file.target)?;
        let shipped = fs::read(&file.source)?;
        let (Ok(installed), Ok(shipped)) = (String::from_utf8(installed), String::from_utf8(shipped))
        else {
            return Ok(conflict_outcome(file, "binary file cannot be merged"));
        };

        let hunks =
            hunk::generate_hunks_with_context(&installed, &shipped, self.config.context_lines);
        let Some(decisions) = hunk::review_file(&file.key, &installed, &hunks, reviewer)? else {
            info!("Skipped merging {}", file.key);
            return Ok(FileOutcome::new(
                &file.key,
                Ownership::KitModified,
                FileAction::MergeSkipped,
            ));
        };

        let accepted = decisions.iter().filter(|d| **d).count();
        let mut outcome = FileOutcome::new(&file.key, Ownership::KitModified, FileAction::Merged);
        let mut stats = MergeStats {
            accepted,
            rejected: hunks.len() - accepted,
            out_of_bounds: 0,
        };

        if accepted > 0 {
            let report = hunk::apply_hunks_with_report(&installed, &hunks, &decisions);
            stats.out_of_bounds = report.skipped.len();

            let permissions = fs::metadata(&file.target)?.permissions();
            atomic_write(&file.target, report.content.as_bytes())?;
            fs::set_permissions(&file.target, permissions)?;
            self.cache.invalidate(&file.target);

            // Track against the shipped content so kept local edits still
            // show up as modifications next time
            let merged_checksum = hash::checksum_bytes(report.content.as_bytes());
            let ownership = if merged_checksum == file.checksum {
                Ownership::Kit
            } else {
                Ownership::KitModified
            };
            manifest.upsert(TrackedFile::new(
                file.key.as_str(),
                file.checksum.clone(),
                ownership,
                version,
            ));
            info!(
                "Merged {}: {} of {} hunk(s) applied",
                file.key,
                accepted,
                hunks.len()
            );
        }

        outcome.merge = Some(stats);
        Ok(outcome)
    }
}

enum Planned {
    /// Nothing to write; optionally re-track with a new entry
    Done(FileOutcome, Option<TrackedFile>),
    Write(FileAction),
    Merge,
}

fn conflict_outcome(file: &ShippedFile, reason: &str) -> FileOutcome {
    let err = Error::ConflictUnresolved(file.key.clone());
    warn!("{} ({})", err, reason);
    FileOutcome::new(&file.key, Ownership::KitModified, FileAction::Conflict)
        .with_detail(format!("{} ({})", err, reason))
}

/// Copy a shipped file into place atomically, keeping its permissions
fn install_file(source: &Path, target: &Path) -> Result<Checksum> {
    let content = fs::read(source).map_err(|e| {
        Error::IoError(format!("Failed to read {}: {}", source.display(), e))
    })?;
    atomic_write(target, &content)?;

    let permissions = fs::metadata(source)?.permissions();
    fs::set_permissions(target, permissions)?;

    Ok(hash::checksum_bytes(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let config = Config::default();
        let layout = Layout::new("/home/u/.claude", &config);

        assert_eq!(layout.settings_path(), Path::new("/home/u/.claude/settings.json"));
        assert_eq!(layout.locks_dir(), PathBuf::from("/home/u/.claude/.kitsync/locks"));
        assert_eq!(
            layout.kit_dir("engineer"),
            PathBuf::from("/home/u/.claude/.kitsync/kits/engineer")
        );
    }

    #[test]
    fn test_project_scope_target() {
        let scope = InstallScope::Project(PathBuf::from("/work/app"));
        assert_eq!(scope.target_dir().unwrap(), PathBuf::from("/work/app/.claude"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert!(matches!(
            Reconciler::new(temp_dir.path(), config),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_missing_source_dir_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let reconciler = Reconciler::new(temp_dir.path().join("target"), Config::default()).unwrap();
        let request = ReconcileRequest::new("kit", "1.0.0", temp_dir.path().join("nope"));

        assert!(matches!(
            reconciler.reconcile(&request, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_state_dir_in_source_is_not_shipped() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("kit");
        fs::create_dir_all(source.join(".kitsync")).unwrap();
        fs::write(source.join(".kitsync/junk"), "x").unwrap();
        fs::write(source.join("a.md"), "a").unwrap();

        let reconciler = Reconciler::new(temp_dir.path().join("target"), Config {
            concurrency: 2,
            ..Config::default()
        })
        .unwrap();
        let summary = reconciler
            .reconcile(&ReconcileRequest::new("kit", "1.0.0", &source), None)
            .unwrap();

        let paths: Vec<&str> = summary.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md"]);
    }
}
