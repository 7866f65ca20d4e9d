// src/hunk/diff.rs

//! LCS line diff and grouping into hunks

use super::{Hunk, HunkLine, LineTag, split_lines};
use tracing::trace;

/// Context lines shown around each change
pub const DEFAULT_CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edit<'a> {
    tag: LineTag,
    text: &'a str,
}

impl<'a> Edit<'a> {
    fn equal(text: &'a str) -> Self {
        Self {
            tag: LineTag::Context,
            text,
        }
    }
}

/// Diff two contents into hunks with the default context
///
/// Identical contents yield no hunks. `label` only names the file in logs.
pub fn generate_hunks(old: &str, new: &str, label: &str) -> Vec<Hunk> {
    let hunks = generate_hunks_with_context(old, new, DEFAULT_CONTEXT_LINES);
    trace!("{}: {} hunk(s)", label, hunks.len());
    hunks
}

/// Diff two contents into hunks with `context` lines around each change
///
/// Changes separated by at most `2 * context` unchanged lines share a hunk.
pub fn generate_hunks_with_context(old: &str, new: &str, context: usize) -> Vec<Hunk> {
    if old == new {
        return Vec::new();
    }

    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let edits = diff_lines(&old_lines, &new_lines);

    // Lines consumed on each side before edit k
    let mut old_pos = Vec::with_capacity(edits.len() + 1);
    let mut new_pos = Vec::with_capacity(edits.len() + 1);
    let (mut o, mut n) = (0, 0);
    for edit in &edits {
        old_pos.push(o);
        new_pos.push(n);
        match edit.tag {
            LineTag::Context => {
                o += 1;
                n += 1;
            }
            LineTag::Delete => o += 1,
            LineTag::Insert => n += 1,
        }
    }

    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| e.tag != LineTag::Context)
        .map(|(i, _)| i)
        .collect();

    let mut hunks = Vec::new();
    let mut g = 0;
    while g < changes.len() {
        let first = changes[g];
        let mut last = first;
        let mut k = g + 1;
        while k < changes.len() && changes[k] - last - 1 <= 2 * context {
            last = changes[k];
            k += 1;
        }

        let lo = first.saturating_sub(context);
        let hi = (last + context).min(edits.len() - 1);
        let lines = edits[lo..=hi]
            .iter()
            .map(|e| HunkLine::new(e.tag, e.text))
            .collect();

        hunks.push(Hunk::new(old_pos[lo] + 1, new_pos[lo] + 1, lines));
        g = k;
    }

    hunks
}

/// Full edit script between two line lists
fn diff_lines<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Edit<'a>> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut edits = Vec::with_capacity(old.len().max(new.len()));
    edits.extend(old[..prefix].iter().map(|t| Edit::equal(t)));
    edits.extend(lcs_edits(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
    ));
    edits.extend(old[old.len() - suffix..].iter().map(|t| Edit::equal(t)));
    edits
}

/// Edit script for the differing middle section via an LCS table
///
/// Deletions are emitted before insertions where both are possible.
fn lcs_edits<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Edit<'a>> {
    let (n, m) = (old.len(), new.len());
    let width = m + 1;

    // table[i * width + j] = LCS length of old[i..] and new[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            edits.push(Edit::equal(old[i]));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            edits.push(Edit {
                tag: LineTag::Delete,
                text: old[i],
            });
            i += 1;
        } else {
            edits.push(Edit {
                tag: LineTag::Insert,
                text: new[j],
            });
            j += 1;
        }
    }
    edits.extend(old[i..].iter().map(|t| Edit {
        tag: LineTag::Delete,
        text: t,
    }));
    edits.extend(new[j..].iter().map(|t| Edit {
        tag: LineTag::Insert,
        text: t,
    }));
    edits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_contents_have_no_hunks() {
        assert!(generate_hunks("a\nb\n", "a\nb\n", "x").is_empty());
        assert!(generate_hunks("", "", "x").is_empty());
    }

    #[test]
    fn test_append_after_blank_line() {
        let hunks = generate_hunks("line1\n\nline3", "line1\n\nline3\nline4", "f");
        assert_eq!(hunks.len(), 1);

        let hunk = &hunks[0];
        assert_eq!(hunk.old_start(), 1);
        assert_eq!(hunk.old_line_count(), 3);
        assert_eq!(hunk.new_line_count(), 4);
        assert_eq!(hunk.insertions(), 1);
        assert_eq!(hunk.lines()[1], HunkLine::new(LineTag::Context, ""));
        assert_eq!(hunk.lines()[3], HunkLine::new(LineTag::Insert, "line4"));
    }

    #[test]
    fn test_far_apart_changes_split() {
        let old: Vec<String> = (1..=20).map(|i| format!("line{}", i)).collect();
        let mut new = old.clone();
        new[1] = "changed2".to_string();
        new[17] = "changed18".to_string();

        let hunks = generate_hunks(&old.join("\n"), &new.join("\n"), "f");
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].old_start(), 1);
        assert_eq!(hunks[1].old_start(), 15);
        assert_eq!(hunks[1].old_line_count(), 6);
    }

    #[test]
    fn test_close_changes_merge() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8";
        let new = "1\nX\n3\n4\n5\n6\nY\n8";
        // Four unchanged lines between changes, within 2 * 3 context
        assert_eq!(generate_hunks(old, new, "f").len(), 1);
        assert_eq!(generate_hunks_with_context(old, new, 1).len(), 2);
    }

    #[test]
    fn test_pure_insert_start_is_insertion_index() {
        let hunks = generate_hunks_with_context("a\nb", "a\nnew\nb", 0);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_start(), 2);
        assert_eq!(hunks[0].old_line_count(), 0);
        assert_eq!(hunks[0].new_start(), 2);
    }

    #[test]
    fn test_replacement_orders_delete_before_insert() {
        let hunks = generate_hunks_with_context("a\nold\nc", "a\nnew\nc", 0);
        let tags: Vec<_> = hunks[0].lines().iter().map(|l| l.tag).collect();
        assert_eq!(tags, vec![LineTag::Delete, LineTag::Insert]);
        assert_eq!(hunks[0].header(), "@@ -2,1 +2,1 @@");
    }

    #[test]
    fn test_trailing_newline_is_a_change() {
        let hunks = generate_hunks("a\nb", "a\nb\n", "f");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].insertions(), 1);
        assert_eq!(hunks[0].lines().last().unwrap().text, "");
    }
}
