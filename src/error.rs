// src/error.rs

//! Error taxonomy for the reconciliation engine
//!
//! Expected divergence (a user-modified file, a hook the user deleted) is never
//! an error; it is reported through result values. The variants here cover
//! failures that stop an operation.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid checksum: {0}")]
    Checksum(#[from] crate::hash::ChecksumError),

    #[error("{}", lock_contention_message(.name, .path, .holder_pid, .held_for_secs, .stale))]
    LockContention {
        name: String,
        path: PathBuf,
        holder_pid: Option<u32>,
        held_for_secs: Option<u64>,
        stale: bool,
    },

    #[error("Unresolved conflict: {0} was modified locally and has no automatic merge strategy")]
    ConflictUnresolved(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

fn lock_contention_message(
    name: &str,
    path: &std::path::Path,
    holder_pid: &Option<u32>,
    held_for_secs: &Option<u64>,
    stale: &bool,
) -> String {
    let holder = match holder_pid {
        Some(pid) => format!("process {}", pid),
        None => "another process".to_string(),
    };
    let age = held_for_secs
        .map(|secs| format!(" for {}s", secs))
        .unwrap_or_default();

    if *stale {
        format!(
            "Lock '{}' has been held by {}{} and looks stale. \
             If no other kitsync operation is running, remove {} and retry.",
            name,
            holder,
            age,
            path.display()
        )
    } else {
        format!(
            "Lock '{}' is held by {}{}. Wait for that operation to finish, \
             or remove {} if it was interrupted.",
            name,
            holder,
            age,
            path.display()
        )
    }
}
