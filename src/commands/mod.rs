// src/commands/mod.rs
//! Command handlers for the kitsync CLI

mod diff;
mod normalize;
mod status;
mod uninstall;
mod update;

pub use diff::cmd_diff;
pub use normalize::cmd_normalize;
pub use status::cmd_status;
pub use uninstall::cmd_uninstall;
pub use update::{ReviewMode, cmd_update};

use crate::cli::TargetArgs;
use anyhow::{Context, Result};
use kitsync::reconcile::{InstallScope, Reconciler};
use kitsync::Config;
use std::path::{Path, PathBuf};

/// Build a reconciler for the selected install target
pub(crate) fn open_reconciler(config_path: Option<&Path>, target: &TargetArgs) -> Result<Reconciler> {
    let config = Config::load(config_path)?;
    let dir = resolve_target(target)?;
    tracing::debug!("Install target: {}", dir.display());
    Ok(Reconciler::new(dir, config)?)
}

fn resolve_target(target: &TargetArgs) -> Result<PathBuf> {
    if let Some(dir) = &target.target {
        return Ok(dir.clone());
    }

    let scope = if target.global {
        InstallScope::Global
    } else {
        let root = match &target.project {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        InstallScope::Project(root)
    };
    Ok(scope.target_dir()?)
}

/// Print a value as pretty JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
