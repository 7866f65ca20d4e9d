// src/commands/diff.rs

//! Show pending changes for one file

use super::open_reconciler;
use crate::cli::TargetArgs;
use anyhow::Result;
use std::io::IsTerminal;
use std::path::Path;

pub fn cmd_diff(
    config_path: Option<&Path>,
    source: &Path,
    path: &str,
    target: &TargetArgs,
    no_color: bool,
) -> Result<()> {
    let reconciler = open_reconciler(config_path, target)?;
    let color = !no_color && std::io::stdout().is_terminal();

    match reconciler.diff(source, path, color)? {
        Some(diff) => print!("{}", diff),
        None => println!("{} is identical to the shipped version", path),
    }
    Ok(())
}
