// src/reconcile/summary.rs

//! Result values of reconciliation runs

use crate::manifest::Ownership;
use crate::settings::MergeResult;
use serde::Serialize;
use std::fmt::Write as _;

/// What happened to one shipped file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileAction {
    /// Absent on disk, written and tracked
    Installed,
    /// Pristine and changed upstream, overwritten
    Updated,
    /// Pristine and identical to the shipped version
    Unchanged,
    /// User-owned, left alone and not tracked
    SkippedUser,
    /// Edited locally under a protected path, left alone
    Preserved,
    /// Edited locally, but the edits match the shipped version
    AlreadyCurrent,
    /// Edited locally, reviewed hunk by hunk
    Merged,
    /// Edited locally, review abandoned for this file
    MergeSkipped,
    /// Edited locally with no way to merge it here
    Conflict,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Installed => "installed",
            FileAction::Updated => "updated",
            FileAction::Unchanged => "unchanged",
            FileAction::SkippedUser => "skipped-user",
            FileAction::Preserved => "preserved",
            FileAction::AlreadyCurrent => "already-current",
            FileAction::Merged => "merged",
            FileAction::MergeSkipped => "merge-skipped",
            FileAction::Conflict => "conflict",
        }
    }

    /// Whether the file on disk was written
    pub fn wrote_file(&self) -> bool {
        matches!(self, FileAction::Installed | FileAction::Updated)
    }
}

/// Hunk tallies for a merged file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Accepted hunks that no longer fit the file
    pub out_of_bounds: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: String,
    /// Ownership found before anything was written
    pub ownership: Ownership,
    pub action: FileAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FileOutcome {
    pub(crate) fn new(path: &str, ownership: Ownership, action: FileAction) -> Self {
        Self {
            path: path.to_string(),
            ownership,
            action,
            merge: None,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Summary of one update run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub kit_id: String,
    pub version: String,
    pub previous_version: Option<String>,
    pub files: Vec<FileOutcome>,
    pub settings: MergeResult,
    /// Paths left unmerged that need attention
    pub unresolved: Vec<String>,
}

impl ReconcileSummary {
    pub fn count(&self, action: FileAction) -> usize {
        self.files.iter().filter(|f| f.action == action).count()
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Human-readable report
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        match &self.previous_version {
            Some(prev) if prev != &self.version => {
                let _ = writeln!(out, "Updated kit {} {} -> {}", self.kit_id, prev, self.version);
            }
            Some(_) => {
                let _ = writeln!(out, "Reinstalled kit {} {}", self.kit_id, self.version);
            }
            None => {
                let _ = writeln!(out, "Installed kit {} {}", self.kit_id, self.version);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Files:");
        for action in [
            FileAction::Installed,
            FileAction::Updated,
            FileAction::Unchanged,
            FileAction::Merged,
            FileAction::AlreadyCurrent,
            FileAction::Preserved,
            FileAction::SkippedUser,
            FileAction::MergeSkipped,
            FileAction::Conflict,
        ] {
            let n = self.count(action);
            if n > 0 {
                let _ = writeln!(out, "  {:<16} {}", action.as_str(), n);
            }
        }

        let hooks = &self.settings.hooks;
        let services = &self.settings.services;
        let _ = writeln!(out);
        let _ = writeln!(out, "Settings:");
        let _ = writeln!(
            out,
            "  hooks            {} added, {} preserved, {} skipped",
            hooks.added, hooks.preserved, hooks.skipped
        );
        let _ = writeln!(
            out,
            "  services         {} added, {} preserved, {} updated, {} skipped",
            services.added, services.preserved, services.updated, services.skipped
        );

        if !self.settings.conflicts.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Already present (kept your version):");
            for conflict in &self.settings.conflicts {
                match &conflict.location {
                    Some(location) => {
                        let _ = writeln!(out, "  {} {}", location, conflict.key);
                    }
                    None => {
                        let _ = writeln!(out, "  {}", conflict.key);
                    }
                }
            }
        }

        if !self.unresolved.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Needs attention:");
            for outcome in self.files.iter().filter(|f| self.unresolved.contains(&f.path)) {
                let _ = writeln!(
                    out,
                    "  {}: {}",
                    outcome.path,
                    outcome.detail.as_deref().unwrap_or(outcome.action.as_str())
                );
            }
        }

        out
    }
}

/// Read-only view of one installed kit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KitStatus {
    pub kit_id: String,
    pub installed_version: String,
    pub last_updated: String,
    pub files: Vec<FileStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub path: String,
    pub ownership: Ownership,
    pub exists: bool,
}

impl KitStatus {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Kit {} {} (last updated {})",
            self.kit_id, self.installed_version, self.last_updated
        );
        for file in &self.files {
            let state = if file.exists {
                file.ownership.as_str()
            } else {
                "missing"
            };
            let _ = writeln!(out, "  {:<12} {}", state, file.path);
        }
        out
    }
}

/// Result of removing a kit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallSummary {
    pub kit_id: String,
    /// Pristine files deleted
    pub removed: Vec<String>,
    /// Locally edited files left in place
    pub kept: Vec<String>,
    /// Tracked files already gone
    pub missing: Vec<String>,
}

impl UninstallSummary {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Uninstalled kit {}: {} removed, {} kept, {} already missing",
            self.kit_id,
            self.removed.len(),
            self.kept.len(),
            self.missing.len()
        );
        for path in &self.kept {
            let _ = writeln!(out, "  kept (modified) {}", path);
        }
        out
    }
}
