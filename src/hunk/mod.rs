// src/hunk/mod.rs

//! Line-level hunk diff and selective patching
//!
//! Used when a kit file the user has edited also changed upstream. The
//! installed content is diffed against the shipped content, the user accepts
//! or rejects each hunk, and only accepted hunks are applied.
//!
//! Content is split on `\n` and rejoined with `\n`, so blank lines, a trailing
//! newline and its absence all round-trip exactly.
//!
//! Line numbers in a [`Hunk`] are 1-based, and `old_start - 1` is always the
//! 0-based index in the old content where the hunk's old side begins, also for
//! hunks that only insert.

mod apply;
mod diff;
mod review;

pub use apply::{ApplyReport, apply_hunks, apply_hunks_with_report};
pub use diff::{DEFAULT_CONTEXT_LINES, generate_hunks, generate_hunks_with_context};
pub use review::{
    AutoReviewer, CONTEXT_STEP, HunkPrompt, HunkReviewer, ReviewDecision, render_hunk,
    review_file,
};

use serde::Serialize;
use std::fmt;

/// Role of a line within a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTag {
    /// Present on both sides
    Context,
    /// Only in the new content
    Insert,
    /// Only in the old content
    Delete,
}

impl LineTag {
    /// Unified diff prefix character
    pub fn prefix(&self) -> char {
        match self {
            LineTag::Context => ' ',
            LineTag::Insert => '+',
            LineTag::Delete => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HunkLine {
    pub tag: LineTag,
    pub text: String,
}

impl HunkLine {
    pub fn new(tag: LineTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }
}

/// A contiguous block of changes plus surrounding context
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hunk {
    old_start: usize,
    old_line_count: usize,
    new_start: usize,
    new_line_count: usize,
    lines: Vec<HunkLine>,
}

impl Hunk {
    /// Build a hunk; line counts are derived from the tagged lines
    pub fn new(old_start: usize, new_start: usize, lines: Vec<HunkLine>) -> Self {
        let old_line_count = lines.iter().filter(|l| l.tag != LineTag::Insert).count();
        let new_line_count = lines.iter().filter(|l| l.tag != LineTag::Delete).count();
        Self {
            old_start,
            old_line_count,
            new_start,
            new_line_count,
            lines,
        }
    }

    pub fn old_start(&self) -> usize {
        self.old_start
    }

    pub fn old_line_count(&self) -> usize {
        self.old_line_count
    }

    pub fn new_start(&self) -> usize {
        self.new_start
    }

    pub fn new_line_count(&self) -> usize {
        self.new_line_count
    }

    pub fn lines(&self) -> &[HunkLine] {
        &self.lines
    }

    /// Lines of the new side (context and inserts)
    pub fn new_side(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| l.tag != LineTag::Delete)
            .map(|l| l.text.as_str())
    }

    /// Lines of the old side (context and deletes)
    pub fn old_side(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| l.tag != LineTag::Insert)
            .map(|l| l.text.as_str())
    }

    pub fn insertions(&self) -> usize {
        self.lines.iter().filter(|l| l.tag == LineTag::Insert).count()
    }

    pub fn deletions(&self) -> usize {
        self.lines.iter().filter(|l| l.tag == LineTag::Delete).count()
    }

    /// `@@ -old_start,old_count +new_start,new_count @@`
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_line_count, self.new_start, self.new_line_count
        )
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.lines {
            writeln!(f, "{}{}", line.tag.prefix(), line.text)?;
        }
        Ok(())
    }
}

/// Split content into lines the way every hunk operation does
pub(crate) fn split_lines(content: &str) -> Vec<&str> {
    content.split('\n').collect()
}
