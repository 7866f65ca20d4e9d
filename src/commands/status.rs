// src/commands/status.rs

//! Report installed kits

use super::{open_reconciler, print_json};
use crate::cli::TargetArgs;
use anyhow::Result;
use std::path::Path;

pub fn cmd_status(
    config_path: Option<&Path>,
    kit: Option<&str>,
    target: &TargetArgs,
    json: bool,
) -> Result<()> {
    let reconciler = open_reconciler(config_path, target)?;

    let kits = match kit {
        Some(kit) => vec![kit.to_string()],
        None => reconciler.installed_kits()?,
    };

    let mut statuses = Vec::with_capacity(kits.len());
    for kit in &kits {
        match reconciler.status(kit)? {
            Some(status) => statuses.push(status),
            None => return Err(anyhow::anyhow!("Kit '{}' is not installed", kit)),
        }
    }

    if json {
        return print_json(&statuses);
    }

    if statuses.is_empty() {
        println!(
            "No kits installed in {}",
            reconciler.layout().target().display()
        );
        return Ok(());
    }
    for status in &statuses {
        print!("{}", status.render_text());
    }
    Ok(())
}
