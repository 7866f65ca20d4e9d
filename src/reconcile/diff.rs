// src/reconcile/diff.rs

//! Unified diff between an installed file and its shipped version

use super::Reconciler;
use crate::filesystem::safe_join;
use crate::{Error, Result};
use diffy::PatchFormatter;
use std::fs;
use std::path::Path;

/// Render a unified diff from `installed` to `shipped`
///
/// Returns `None` when the contents are identical. A missing installed file
/// diffs as empty.
pub fn diff_file(installed: &Path, shipped: &Path, color: bool) -> Result<Option<String>> {
    let old = read_text(installed, true)?;
    let new = read_text(shipped, false)?;

    if old == new {
        return Ok(None);
    }

    let patch = diffy::create_patch(&old, &new);
    let formatter = if color {
        PatchFormatter::new().with_color()
    } else {
        PatchFormatter::new()
    };
    Ok(Some(formatter.fmt_patch(&patch).to_string()))
}

fn read_text(path: &Path, missing_ok: bool) -> Result<String> {
    match fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes).map_err(|_| Error::Parse {
            path: path.to_path_buf(),
            message: "not a text file".to_string(),
        }),
        Err(e) if missing_ok && e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(Error::IoError(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

impl Reconciler {
    /// Diff one kit-relative path between the install target and `source_dir`
    pub fn diff(&self, source_dir: &Path, path: &str, color: bool) -> Result<Option<String>> {
        let installed = safe_join(self.layout.target(), path)?;
        let shipped = safe_join(source_dir, path)?;
        diff_file(&installed, &shipped, color)
    }
}
