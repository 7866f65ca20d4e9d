// src/hunk/apply.rs

//! Selective hunk application

use super::{Hunk, split_lines};
use serde::Serialize;
use tracing::warn;

/// Outcome of applying a set of hunk decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub content: String,
    /// Indices of accepted hunks that were applied
    pub applied: Vec<usize>,
    /// Indices of accepted hunks skipped because they fell outside the buffer
    pub skipped: Vec<usize>,
}

/// Apply the accepted hunks to `old`
///
/// `decisions[i]` accepts (`true`) or rejects hunk `i`; a missing decision
/// rejects. Out-of-range hunks are skipped silently.
pub fn apply_hunks(old: &str, hunks: &[Hunk], decisions: &[bool]) -> String {
    apply_hunks_with_report(old, hunks, decisions).content
}

/// Like [`apply_hunks`], but also reports which hunks were skipped
///
/// Hunks are applied in ascending `old_start` order, whatever order they are
/// passed in. A single running offset tracks how far earlier accepted hunks
/// have shifted the buffer.
pub fn apply_hunks_with_report(old: &str, hunks: &[Hunk], decisions: &[bool]) -> ApplyReport {
    let mut report = ApplyReport {
        content: String::new(),
        applied: Vec::new(),
        skipped: Vec::new(),
    };

    if hunks.is_empty() || !decisions.iter().any(|d| *d) {
        report.content = old.to_string();
        return report;
    }

    let mut buffer: Vec<&str> = split_lines(old);
    let mut order: Vec<usize> = (0..hunks.len()).collect();
    order.sort_by_key(|&i| hunks[i].old_start());

    let mut offset: i64 = 0;
    for index in order {
        if !decisions.get(index).copied().unwrap_or(false) {
            continue;
        }

        let hunk = &hunks[index];
        let start = hunk.old_start() as i64 - 1 + offset;
        if start < 0 || start as usize + hunk.old_line_count() > buffer.len() {
            warn!(
                "Skipping hunk {} ({}): outside a {}-line buffer",
                index,
                hunk.header(),
                buffer.len()
            );
            report.skipped.push(index);
            continue;
        }

        let start = start as usize;
        buffer.splice(start..start + hunk.old_line_count(), hunk.new_side());
        offset += hunk.new_line_count() as i64 - hunk.old_line_count() as i64;
        report.applied.push(index);
    }

    report.content = buffer.join("\n");
    report
}
