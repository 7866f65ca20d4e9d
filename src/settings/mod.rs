// src/settings/mod.rs

//! Settings documents and the settings merger
//!
//! A kit ships a settings fragment (hooks and services). On every install the
//! fragment is merged into the live settings document of the install scope.
//! See [`merge`] for the merge rules.

mod document;
pub mod merge;

pub use document::{EventHooks, EventMatcher, HookEntry, HookGroup, ServiceEntry, SettingsDocument};
pub use merge::{
    CandidateOutcome, CategoryCounts, InstalledEntry, MergeConflict, MergeResult,
    ResolutionReason, ResolutionWinner, ServiceResolution, SettingsCategory, classify_candidate,
    installed_identifiers, merge_hook_entries, merge_service_entries, merge_settings,
    union_baseline,
};
