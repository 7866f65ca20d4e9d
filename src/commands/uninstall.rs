// src/commands/uninstall.rs

//! Remove an installed kit

use super::{open_reconciler, print_json};
use crate::cli::TargetArgs;
use anyhow::Result;
use std::path::Path;
use tracing::info;

pub fn cmd_uninstall(
    config_path: Option<&Path>,
    kit: &str,
    target: &TargetArgs,
    json: bool,
) -> Result<()> {
    let reconciler = open_reconciler(config_path, target)?;
    info!("Uninstalling kit {}", kit);

    let summary = reconciler.uninstall(kit)?;
    if json {
        print_json(&summary)
    } else {
        print!("{}", summary.render_text());
        Ok(())
    }
}
