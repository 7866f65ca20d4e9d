// src/commands/update.rs

//! Install or update a kit

use super::{open_reconciler, print_json};
use crate::cli::TargetArgs;
use anyhow::Result;
use kitsync::hunk::{AutoReviewer, HunkReviewer};
use kitsync::prompt::PromptReviewer;
use kitsync::reconcile::ReconcileRequest;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How locally edited files are reviewed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    Prompt,
    AcceptAll,
    KeepLocal,
}

pub fn cmd_update(
    config_path: Option<&Path>,
    kit: &str,
    source: PathBuf,
    version: &str,
    target: &TargetArgs,
    mode: ReviewMode,
    json: bool,
) -> Result<()> {
    let reconciler = open_reconciler(config_path, target)?;
    let request = ReconcileRequest::new(kit, version, source);

    let mut auto;
    let mut prompt;
    let reviewer: Option<&mut dyn HunkReviewer> = match mode {
        ReviewMode::AcceptAll => {
            auto = AutoReviewer::accept_all();
            Some(&mut auto)
        }
        ReviewMode::KeepLocal => {
            auto = AutoReviewer::reject_all();
            Some(&mut auto)
        }
        ReviewMode::Prompt if !json && PromptReviewer::is_interactive() => {
            prompt = PromptReviewer::stdio();
            Some(&mut prompt)
        }
        ReviewMode::Prompt => {
            info!("Not running on a terminal, locally edited files will not be merged");
            None
        }
    };

    let summary = reconciler.reconcile(&request, reviewer)?;

    if json {
        print_json(&summary)?;
    } else {
        print!("{}", summary.render_text());
    }

    if summary.has_unresolved() {
        warn!("Re-run interactively, or with --accept-all or --keep-local, to resolve");
    }
    Ok(())
}
