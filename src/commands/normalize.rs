// src/commands/normalize.rs

//! Print canonical hook commands

use super::print_json;
use anyhow::Result;
use kitsync::normalize::normalize;

pub fn cmd_normalize(commands: &[String], json: bool) -> Result<()> {
    let normalized: Vec<String> = commands.iter().map(|c| normalize(c)).collect();

    if json {
        return print_json(&normalized);
    }
    for line in normalized {
        println!("{}", line);
    }
    Ok(())
}
