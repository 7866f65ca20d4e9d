// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::ReviewMode;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Update {
            kit,
            source,
            kit_version,
            target,
            accept_all,
            keep_local,
        } => {
            let mode = if accept_all {
                ReviewMode::AcceptAll
            } else if keep_local {
                ReviewMode::KeepLocal
            } else {
                ReviewMode::Prompt
            };
            commands::cmd_update(config, &kit, source, &kit_version, &target, mode, cli.json)
        }
        Commands::Status { kit, target } => {
            commands::cmd_status(config, kit.as_deref(), &target, cli.json)
        }
        Commands::Diff {
            source,
            path,
            target,
            no_color,
        } => commands::cmd_diff(config, &source, &path, &target, no_color),
        Commands::Uninstall { kit, target } => {
            commands::cmd_uninstall(config, &kit, &target, cli.json)
        }
        Commands::Normalize { commands: list } => commands::cmd_normalize(&list, cli.json),
    }
}
