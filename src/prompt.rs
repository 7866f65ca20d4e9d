// src/prompt.rs

//! Interactive hunk review on a terminal
//!
//! Shows one hunk at a time and reads a single-letter answer. Reads and
//! writes go through generic handles so the prompt can be driven from tests.

use crate::Result;
use crate::hunk::{HunkPrompt, HunkReviewer, ReviewDecision};
use std::io::{self, BufRead, IsTerminal, Write};

/// Line-oriented hunk reviewer
pub struct PromptReviewer<R, W> {
    input: R,
    output: W,
}

impl PromptReviewer<io::StdinLock<'static>, io::Stdout> {
    /// Reviewer reading stdin and writing stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }

    /// Whether both stdin and stdout are terminals
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal() && io::stdout().is_terminal()
    }
}

impl<R: BufRead, W: Write> PromptReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Hand back the output handle
    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, prompt: &HunkPrompt<'_>) -> Result<ReviewDecision> {
        loop {
            write!(self.output, "Apply this hunk? [y/n/e/s/?]: ")?;
            self.output.flush()?;

            let mut input = String::new();
            if self.input.read_line(&mut input)? == 0 {
                // EOF: leave the file alone
                writeln!(self.output)?;
                return Ok(ReviewDecision::SkipFile);
            }

            match input.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(ReviewDecision::Accept),
                "n" | "no" => return Ok(ReviewDecision::Reject),
                "e" | "more" => return Ok(ReviewDecision::ExtendContext),
                "s" | "skip" | "q" => return Ok(ReviewDecision::SkipFile),
                "?" | "help" => {
                    writeln!(self.output, "  y - apply this hunk")?;
                    writeln!(self.output, "  n - keep your version of this hunk")?;
                    writeln!(self.output, "  e - show more surrounding lines")?;
                    writeln!(
                        self.output,
                        "  s - skip {} entirely (discards answers given so far)",
                        prompt.label
                    )?;
                }
                _ => {
                    writeln!(self.output, "Unknown option. Please enter y, n, e, s or ?")?;
                }
            }
        }
    }
}

impl<R: BufRead, W: Write> HunkReviewer for PromptReviewer<R, W> {
    fn review(&mut self, prompt: &HunkPrompt<'_>) -> Result<ReviewDecision> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "--- {} (hunk {}/{}, +{} -{}) ---",
            prompt.label,
            prompt.index + 1,
            prompt.total,
            prompt.hunk.insertions(),
            prompt.hunk.deletions()
        )?;
        if prompt.extra_context > 0 {
            writeln!(self.output, "  (+{} lines of context)", prompt.extra_context)?;
        }
        write!(self.output, "{}", prompt.display)?;

        self.ask(prompt)
    }
}
