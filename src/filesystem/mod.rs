// src/filesystem/mod.rs

//! Filesystem helpers shared by the manifest store and the orchestrator
//!
//! - Atomic replace-by-rename writes for manifests, settings and kit files
//! - Sanitization of kit-relative paths and their `/`-separated manifest keys

mod atomic;
pub mod path;

pub use atomic::{atomic_write, atomic_write_json};
pub use path::{is_under_any, manifest_key, relative_key, safe_join, sanitize_path};
