// src/lib.rs

//! kitsync: repeatable kit installs that keep user edits
//!
//! A kit is a versioned bundle of files plus a settings fragment (hooks and
//! services) installed into a user's configuration directory. Installing a
//! newer version of the same kit must update what the kit owns without
//! clobbering what the user changed or resurrecting what the user removed.
//!
//! # Architecture
//!
//! - Ownership by checksum: every installed file is tracked in a per-kit
//!   manifest; comparing bytes on disk to the recorded checksum tells pristine
//!   files from locally edited ones
//! - Settings merge by identity: hooks compare by normalized command, services
//!   by name; a baseline of previously installed identifiers keeps deleted
//!   entries deleted
//! - Hunk review: locally edited files that changed upstream are merged hunk
//!   by hunk, never overwritten wholesale
//! - One operation lock per install target; manifest and settings writes are
//!   atomic

pub mod config;
mod error;
pub mod filesystem;
pub mod hash;
pub mod hunk;
pub mod lock;
pub mod manifest;
pub mod normalize;
pub mod ownership;
pub mod parallel;
pub mod prompt;
pub mod reconcile;
pub mod settings;

pub use config::Config;
pub use error::{Error, Result};
pub use hash::{Checksum, HashAlgorithm};
pub use hunk::{Hunk, HunkReviewer, ReviewDecision};
pub use manifest::{Manifest, Ownership, TrackedFile};
pub use normalize::normalize;
pub use ownership::{ChecksumCache, ClassificationResult, classify};
pub use reconcile::{
    FileAction, InstallScope, KitStatus, ReconcileRequest, ReconcileSummary, Reconciler,
    UninstallSummary,
};
pub use settings::{MergeResult, SettingsDocument, merge_settings};
