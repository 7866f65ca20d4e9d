// src/hunk/review.rs

//! Sequential per-hunk review
//!
//! [`review_file`] walks the hunks of one file in order and asks a
//! [`HunkReviewer`] about each. Extending the context only changes what is
//! shown and asks about the same hunk again. Skipping the file throws away
//! every decision made for it so far.

use super::{Hunk, split_lines};
use crate::Result;
use serde::Serialize;
use tracing::debug;

/// Extra context lines added per extend-context request
pub const CONTEXT_STEP: usize = 3;

/// Answer for one hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewDecision {
    /// Take the new side
    Accept,
    /// Keep the old side
    Reject,
    /// Show more surrounding lines and ask again
    ExtendContext,
    /// Abandon the whole file, keeping it unchanged
    SkipFile,
}

/// What a reviewer is shown for one hunk
#[derive(Debug)]
pub struct HunkPrompt<'a> {
    /// File being reviewed
    pub label: &'a str,
    pub hunk: &'a Hunk,
    /// 0-based position of this hunk
    pub index: usize,
    pub total: usize,
    /// Extra old-content lines shown around the hunk
    pub extra_context: usize,
    /// Rendered hunk including the extra context
    pub display: String,
}

/// Source of per-hunk decisions
pub trait HunkReviewer {
    fn review(&mut self, prompt: &HunkPrompt<'_>) -> Result<ReviewDecision>;
}

/// Reviewer that gives the same answer to every hunk
#[derive(Debug, Clone, Copy)]
pub struct AutoReviewer {
    accept: bool,
}

impl AutoReviewer {
    pub fn accept_all() -> Self {
        Self { accept: true }
    }

    pub fn reject_all() -> Self {
        Self { accept: false }
    }
}

impl HunkReviewer for AutoReviewer {
    fn review(&mut self, _prompt: &HunkPrompt<'_>) -> Result<ReviewDecision> {
        Ok(if self.accept {
            ReviewDecision::Accept
        } else {
            ReviewDecision::Reject
        })
    }
}

/// Render a hunk with `extra` additional old-content lines on each side
pub fn render_hunk(hunk: &Hunk, old: &str, extra: usize) -> String {
    let old_lines = split_lines(old);
    let start = hunk.old_start().saturating_sub(1).min(old_lines.len());
    let end = (start + hunk.old_line_count()).min(old_lines.len());

    let mut out = String::new();
    out.push_str(&hunk.header());
    out.push('\n');
    for line in &old_lines[start.saturating_sub(extra)..start] {
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
    for line in hunk.lines() {
        out.push(line.tag.prefix());
        out.push_str(&line.text);
        out.push('\n');
    }
    for line in &old_lines[end..(end + extra).min(old_lines.len())] {
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Review every hunk of one file
///
/// Returns one decision per hunk, or `None` if the reviewer skipped the file.
pub fn review_file(
    label: &str,
    old: &str,
    hunks: &[Hunk],
    reviewer: &mut dyn HunkReviewer,
) -> Result<Option<Vec<bool>>> {
    let mut decisions = Vec::with_capacity(hunks.len());

    for (index, hunk) in hunks.iter().enumerate() {
        let mut extra_context = 0;
        loop {
            let prompt = HunkPrompt {
                label,
                hunk,
                index,
                total: hunks.len(),
                extra_context,
                display: render_hunk(hunk, old, extra_context),
            };

            match reviewer.review(&prompt)? {
                ReviewDecision::Accept => {
                    decisions.push(true);
                    break;
                }
                ReviewDecision::Reject => {
                    decisions.push(false);
                    break;
                }
                ReviewDecision::ExtendContext => {
                    extra_context += CONTEXT_STEP;
                }
                ReviewDecision::SkipFile => {
                    debug!("Review of {} skipped after {} hunk(s)", label, index);
                    return Ok(None);
                }
            }
        }
    }

    Ok(Some(decisions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hunk::{apply_hunks, generate_hunks};

    /// Replays a fixed list of answers and records what it was shown
    struct Scripted {
        answers: Vec<ReviewDecision>,
        seen: Vec<(usize, usize)>,
    }

    impl HunkReviewer for Scripted {
        fn review(&mut self, prompt: &HunkPrompt<'_>) -> Result<ReviewDecision> {
            self.seen.push((prompt.index, prompt.extra_context));
            Ok(self.answers.remove(0))
        }
    }

    fn two_hunk_file() -> (String, String) {
        let old: Vec<String> = (1..=20).map(|i| format!("line{}", i)).collect();
        let mut new = old.clone();
        new[0] = "first".to_string();
        new[19] = "last".to_string();
        (old.join("\n"), new.join("\n"))
    }

    #[test]
    fn test_accept_and_reject() {
        let (old, new) = two_hunk_file();
        let hunks = generate_hunks(&old, &new, "f");
        let mut reviewer = Scripted {
            answers: vec![ReviewDecision::Accept, ReviewDecision::Reject],
            seen: Vec::new(),
        };

        let decisions = review_file("f", &old, &hunks, &mut reviewer).unwrap().unwrap();
        assert_eq!(decisions, vec![true, false]);

        let merged = apply_hunks(&old, &hunks, &decisions);
        assert!(merged.starts_with("first\n"));
        assert!(merged.ends_with("\nline20"));
    }

    #[test]
    fn test_extend_context_reprompts_same_hunk() {
        let (old, new) = two_hunk_file();
        let hunks = generate_hunks(&old, &new, "f");
        let mut reviewer = Scripted {
            answers: vec![
                ReviewDecision::ExtendContext,
                ReviewDecision::ExtendContext,
                ReviewDecision::Accept,
                ReviewDecision::Accept,
            ],
            seen: Vec::new(),
        };

        let decisions = review_file("f", &old, &hunks, &mut reviewer).unwrap().unwrap();
        assert_eq!(decisions, vec![true, true]);
        assert_eq!(reviewer.seen, vec![(0, 0), (0, 3), (0, 6), (1, 0)]);
    }

    #[test]
    fn test_skip_discards_file() {
        let (old, new) = two_hunk_file();
        let hunks = generate_hunks(&old, &new, "f");
        let mut reviewer = Scripted {
            answers: vec![ReviewDecision::Accept, ReviewDecision::SkipFile],
            seen: Vec::new(),
        };

        assert!(review_file("f", &old, &hunks, &mut reviewer).unwrap().is_none());
    }

    #[test]
    fn test_auto_reviewer() {
        let (old, new) = two_hunk_file();
        let hunks = generate_hunks(&old, &new, "f");

        let accepted = review_file("f", &old, &hunks, &mut AutoReviewer::accept_all()).unwrap();
        assert_eq!(accepted, Some(vec![true, true]));
        let rejected = review_file("f", &old, &hunks, &mut AutoReviewer::reject_all()).unwrap();
        assert_eq!(rejected, Some(vec![false, false]));
    }

    #[test]
    fn test_render_with_extra_context() {
        let (old, new) = two_hunk_file();
        let hunks = generate_hunks(&old, &new, "f");
        let last = &hunks[1];

        let plain = render_hunk(last, &old, 0);
        let wider = render_hunk(last, &old, 2);
        assert!(plain.starts_with("@@ -17,4 +17,4 @@\n"));
        assert!(!plain.contains(" line15\n"));
        assert!(wider.contains(" line15\n"));
        assert!(wider.contains("-line20\n+last\n"));
        // Clamped at both ends of the file
        assert_eq!(render_hunk(last, &old, 50).lines().count(), 1 + 16 + 5);
    }
}
