// src/settings/merge.rs

//! Merging incoming kit settings into the live settings document
//!
//! Each incoming hook or service is sorted into exactly one of three outcomes
//! by [`classify_candidate`]:
//!
//! - **Duplicate**: the destination already has it (hooks compare by
//!   [`HookEntry::identity`], services by name). The destination copy wins, apart
//!   from the timestamp rule for services below.
//! - **UserDeleted**: a previous install added it and it is gone from the
//!   destination, so the user removed it. It stays removed.
//! - **New**: added, and attributed to the kit that shipped it.
//!
//! Destination entries are never removed. Counters and conflict records go
//! into a [`MergeResult`] the caller creates for each merge.

use super::document::{EventHooks, EventMatcher, HookEntry, HookGroup, ServiceEntry, SettingsDocument};
use crate::manifest::InstalledSettings;
use crate::normalize::normalize;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Which collection an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsCategory {
    Hooks,
    Services,
}

/// Three-way decision for one incoming entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Already present at this index of the destination keys
    Duplicate { index: usize },
    /// Installed before, since removed by the user
    UserDeleted,
    /// Not present and never installed
    New,
}

/// Decide what to do with an incoming entry identified by `key`
///
/// `existing` holds the identity keys of the entries currently in the
/// destination; `previously_installed` is the deletion baseline.
pub fn classify_candidate(
    key: &str,
    existing: &[String],
    previously_installed: &HashSet<String>,
) -> CandidateOutcome {
    if let Some(index) = existing.iter().position(|k| k == key) {
        CandidateOutcome::Duplicate { index }
    } else if previously_installed.contains(key) {
        CandidateOutcome::UserDeleted
    } else {
        CandidateOutcome::New
    }
}

/// Per-category merge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub added: usize,
    pub preserved: usize,
    pub skipped: usize,
    pub updated: usize,
}

/// An incoming entry that collided with an existing one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConflict {
    pub category: SettingsCategory,
    /// Normalized command or service name
    pub key: String,
    /// Event matcher for hooks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub existing: String,
    pub incoming: String,
}

/// Which side of a service collision was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionWinner {
    Existing,
    Incoming,
}

/// Why a side was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionReason {
    /// Incoming `lastModified` is later
    Newer,
    /// Existing `lastModified` is later
    ExistingNewer,
    /// Both timestamps are equal
    Tie,
    /// At least one side has no timestamp
    NoTimestamps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResolution {
    pub name: String,
    pub winner: ResolutionWinner,
    pub reason: ResolutionReason,
}

/// An entry added by this merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledEntry {
    pub category: SettingsCategory,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_kit: Option<String>,
}

/// Accumulated outcome of one merge
///
/// Create a fresh one per merge; nothing here is shared between runs.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    #[serde(skip)]
    pub merged_document: SettingsDocument,
    pub hooks: CategoryCounts,
    pub services: CategoryCounts,
    pub conflicts: Vec<MergeConflict>,
    pub service_resolutions: Vec<ServiceResolution>,
    pub newly_installed: Vec<InstalledEntry>,
    /// Kit id to the keys it added in this merge
    pub entries_by_origin_kit: BTreeMap<String, Vec<String>>,
}

impl MergeResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_new(&mut self, entry: InstalledEntry) {
        if let Some(kit) = &entry.origin_kit {
            self.entries_by_origin_kit
                .entry(kit.clone())
                .or_default()
                .push(entry.key.clone());
        }
        self.newly_installed.push(entry);
    }
}

/// Merge incoming hook entries into the destination entries of one matcher
///
/// Returns the merged list: every destination entry in its original order,
/// followed by the new entries.
pub fn merge_hook_entries(
    source: &[HookEntry],
    dest: &[HookEntry],
    event_matcher: &EventMatcher,
    result: &mut MergeResult,
    previously_installed: &[String],
) -> Vec<HookEntry> {
    let baseline: HashSet<String> = previously_installed.iter().map(|c| normalize(c)).collect();

    let mut merged: Vec<HookEntry> = dest.to_vec();
    let keys: Vec<String> = dest.iter().map(HookEntry::identity).collect();
    let mut seen: HashSet<String> = HashSet::new();
    result.hooks.preserved += dest.len();

    for candidate in source {
        let key = candidate.identity();
        if !seen.insert(key.clone()) {
            // Repeated within the incoming list itself
            result.hooks.skipped += 1;
            continue;
        }

        match classify_candidate(&key, &keys, &baseline) {
            CandidateOutcome::Duplicate { index } => {
                debug!("Hook {} already present under {}", key, event_matcher);
                result.conflicts.push(MergeConflict {
                    category: SettingsCategory::Hooks,
                    key,
                    location: Some(event_matcher.to_string()),
                    existing: dest[index].label(),
                    incoming: candidate.label(),
                });
            }
            CandidateOutcome::UserDeleted => {
                debug!("Hook {} was removed by the user, not re-adding", key);
                result.hooks.skipped += 1;
            }
            CandidateOutcome::New => {
                result.hooks.added += 1;
                result.record_new(InstalledEntry {
                    category: SettingsCategory::Hooks,
                    key: key.clone(),
                    location: Some(event_matcher.to_string()),
                    origin_kit: candidate.origin_kit.clone(),
                });
                merged.push(candidate.clone());
            }
        }
    }

    merged
}

/// Merge incoming services into the destination services
///
/// Name collisions keep the destination entry unless both sides carry a
/// `lastModified` and the incoming one is later.
pub fn merge_service_entries(
    source: &[ServiceEntry],
    dest: &[ServiceEntry],
    result: &mut MergeResult,
    previously_installed: &[String],
    origin_kit: Option<&str>,
) -> Vec<ServiceEntry> {
    let baseline: HashSet<String> = previously_installed.iter().cloned().collect();

    let mut merged: Vec<ServiceEntry> = dest.to_vec();
    let keys: Vec<String> = dest.iter().map(|s| s.name.clone()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut replaced = 0;

    for candidate in source {
        if !seen.insert(candidate.name.as_str()) {
            result.services.skipped += 1;
            continue;
        }

        match classify_candidate(&candidate.name, &keys, &baseline) {
            CandidateOutcome::Duplicate { index } => {
                let existing = &dest[index];
                let (winner, reason) =
                    resolve_by_timestamp(candidate.last_modified(), existing.last_modified());

                result.conflicts.push(MergeConflict {
                    category: SettingsCategory::Services,
                    key: candidate.name.clone(),
                    location: None,
                    existing: compact(&existing.connection_spec()),
                    incoming: compact(&candidate.connection_spec()),
                });
                result.service_resolutions.push(ServiceResolution {
                    name: candidate.name.clone(),
                    winner,
                    reason,
                });

                if winner == ResolutionWinner::Incoming {
                    info!("Updating service {} (incoming definition is newer)", candidate.name);
                    merged[index] = candidate.clone();
                    result.services.updated += 1;
                    replaced += 1;
                }
            }
            CandidateOutcome::UserDeleted => {
                debug!("Service {} was removed by the user, not re-adding", candidate.name);
                result.services.skipped += 1;
            }
            CandidateOutcome::New => {
                result.services.added += 1;
                result.record_new(InstalledEntry {
                    category: SettingsCategory::Services,
                    key: candidate.name.clone(),
                    location: None,
                    origin_kit: origin_kit.map(str::to_string),
                });
                merged.push(candidate.clone());
            }
        }
    }

    result.services.preserved += dest.len() - replaced;
    merged
}

fn resolve_by_timestamp(
    incoming: Option<DateTime<Utc>>,
    existing: Option<DateTime<Utc>>,
) -> (ResolutionWinner, ResolutionReason) {
    match (incoming, existing) {
        (Some(incoming), Some(existing)) if incoming > existing => {
            (ResolutionWinner::Incoming, ResolutionReason::Newer)
        }
        (Some(incoming), Some(existing)) if incoming < existing => {
            (ResolutionWinner::Existing, ResolutionReason::ExistingNewer)
        }
        (Some(_), Some(_)) => (ResolutionWinner::Existing, ResolutionReason::Tie),
        _ => (ResolutionWinner::Existing, ResolutionReason::NoTimestamps),
    }
}

fn compact(spec: &serde_json::Map<String, Value>) -> String {
    serde_json::to_string(spec).unwrap_or_default()
}

/// Merge a kit's settings into the live document
///
/// Hooks merge per event matcher, services by name. `baseline` is what
/// earlier installs of this kit added. The returned result carries the
/// merged document.
pub fn merge_settings(
    source: &SettingsDocument,
    dest: &SettingsDocument,
    kit_id: &str,
    baseline: &InstalledSettings,
) -> MergeResult {
    let mut result = MergeResult::new();
    let mut merged = dest.clone();

    let mut events: Vec<EventHooks> = Vec::new();
    for dest_event in &dest.hooks {
        match source.hooks.iter().find(|e| e.event == dest_event.event) {
            Some(source_event) => {
                events.push(merge_event(
                    source_event,
                    Some(dest_event),
                    kit_id,
                    baseline,
                    &mut result,
                ));
            }
            None => {
                result.hooks.preserved +=
                    dest_event.groups.iter().map(|g| g.hooks.len()).sum::<usize>();
                events.push(dest_event.clone());
            }
        }
    }
    for source_event in &source.hooks {
        if dest.hooks.iter().any(|e| e.event == source_event.event) {
            continue;
        }
        let event = merge_event(source_event, None, kit_id, baseline, &mut result);
        if !event.groups.is_empty() {
            events.push(event);
        }
    }
    merged.hooks = events;

    merged.services = merge_service_entries(
        &source.services,
        &dest.services,
        &mut result,
        &baseline.services,
        Some(kit_id),
    );

    info!(
        "Merged settings for kit {}: hooks +{} ={} skipped {}, services +{} ={} ~{} skipped {}",
        kit_id,
        result.hooks.added,
        result.hooks.preserved,
        result.hooks.skipped,
        result.services.added,
        result.services.preserved,
        result.services.updated,
        result.services.skipped
    );

    result.merged_document = merged;
    result
}

/// Merge one event's groups; groups sharing a matcher are combined first
fn merge_event(
    source: &EventHooks,
    dest: Option<&EventHooks>,
    kit_id: &str,
    baseline: &InstalledSettings,
    result: &mut MergeResult,
) -> EventHooks {
    let source_groups = coalesce(&source.event, &source.groups);
    let mut groups = dest
        .map(|d| coalesce(&d.event, &d.groups))
        .unwrap_or_default();

    for incoming in source_groups {
        let matcher = incoming.event_matcher(&source.event);
        let attributed: Vec<HookEntry> = incoming
            .hooks
            .iter()
            .map(|h| {
                let mut h = h.clone();
                h.origin_kit.get_or_insert_with(|| kit_id.to_string());
                h
            })
            .collect();

        match groups
            .iter_mut()
            .find(|g| g.event_matcher(&source.event) == matcher)
        {
            Some(existing) => {
                existing.hooks = merge_hook_entries(
                    &attributed,
                    &existing.hooks,
                    &matcher,
                    result,
                    &baseline.hook_commands,
                );
            }
            None => {
                let hooks =
                    merge_hook_entries(&attributed, &[], &matcher, result, &baseline.hook_commands);
                if !hooks.is_empty() {
                    groups.push(HookGroup {
                        hooks,
                        ..incoming
                    });
                }
            }
        }
    }

    // Destination groups the source never touched were counted by neither
    // branch above
    let touched: HashSet<EventMatcher> = coalesce(&source.event, &source.groups)
        .iter()
        .map(|g| g.event_matcher(&source.event))
        .collect();
    for group in &groups {
        if !touched.contains(&group.event_matcher(&source.event)) {
            result.hooks.preserved += group.hooks.len();
        }
    }

    EventHooks {
        event: source.event.clone(),
        groups,
    }
}

/// Combine groups with the same matcher, keeping first-seen order
fn coalesce(event: &str, groups: &[HookGroup]) -> Vec<HookGroup> {
    let mut out: Vec<HookGroup> = Vec::new();
    for group in groups {
        let matcher = group.event_matcher(event);
        match out.iter_mut().find(|g| g.event_matcher(event) == matcher) {
            Some(existing) => existing.hooks.extend(group.hooks.iter().cloned()),
            None => out.push(group.clone()),
        }
    }
    out
}

/// Identifiers a settings document would install: normalized hook commands
/// and service names, deduplicated in document order
pub fn installed_identifiers(doc: &SettingsDocument) -> InstalledSettings {
    let mut hook_commands: Vec<String> = Vec::new();
    for (_, hook) in doc.hook_entries() {
        let key = hook.identity();
        if !key.is_empty() && !hook_commands.contains(&key) {
            hook_commands.push(key);
        }
    }

    let mut services: Vec<String> = Vec::new();
    for service in &doc.services {
        if !services.contains(&service.name) {
            services.push(service.name.clone());
        }
    }

    InstalledSettings {
        hook_commands,
        services,
    }
}

/// Union of two baselines, `previous` first
pub fn union_baseline(previous: &InstalledSettings, current: &InstalledSettings) -> InstalledSettings {
    let mut merged = previous.clone();
    for command in &current.hook_commands {
        let key = normalize(command);
        if !merged.hook_commands.contains(&key) {
            merged.hook_commands.push(key);
        }
    }
    for service in &current.services {
        if !merged.services.contains(service) {
            merged.services.push(service.clone());
        }
    }
    merged
}
