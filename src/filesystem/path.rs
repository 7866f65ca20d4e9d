// src/filesystem/path.rs

//! Path handling for kit-relative paths
//!
//! Paths in a manifest come from kit content and are written back under the
//! install target, so they are treated as untrusted: no `..`, no absolute
//! roots. They are stored with `/` separators regardless of platform so a
//! manifest written on Windows classifies the same files on Linux.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize a kit-relative path
///
/// 1. Accepts `\` as a separator
/// 2. Rejects `..` components
/// 3. Skips `.` components and leading roots
/// 4. Rejects paths that end up empty
///
/// ```
/// use kitsync::filesystem::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("hooks/init.js").unwrap(), PathBuf::from("hooks/init.js"));
/// assert_eq!(sanitize_path("/hooks/init.js").unwrap(), PathBuf::from("hooks/init.js"));
/// assert!(sanitize_path("../settings.json").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path_str = path.as_ref().to_string_lossy().replace('\\', "/");
    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path_str.clone())),
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "Empty path after sanitization: {:?}",
            path_str
        )));
    }

    Ok(normalized)
}

/// Join an untrusted relative path onto `root`, refusing to escape it
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let joined = root.join(sanitize_path(path.as_ref())?);

    // Catches symlinked directories pointing outside the root
    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "Path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Canonical manifest key for a relative path: sanitized, `/`-separated
pub fn manifest_key(path: impl AsRef<Path>) -> Result<String> {
    let sanitized = sanitize_path(path)?;
    let parts: Vec<String> = sanitized
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Manifest key of `path` relative to `root`
pub fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        ))
    })?;
    manifest_key(relative)
}

/// Whether a manifest key falls under any of the given path prefixes
///
/// Prefixes match whole components: `hooks` covers `hooks/a.js` but not
/// `hooks-extra/a.js`.
pub fn is_under_any(key: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        let prefix = prefix.replace('\\', "/");
        let prefix = prefix.trim_matches('/');
        !prefix.is_empty()
            && (key == prefix
                || key
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/')))
    })
}
