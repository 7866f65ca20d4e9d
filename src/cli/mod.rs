// src/cli/mod.rs
//! CLI definitions for kitsync
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kitsync")]
#[command(version)]
#[command(about = "Install and update configuration kits without clobbering local edits", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: $KITSYNC_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Where to install
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Install into the user's home configuration
    #[arg(long, conflicts_with_all = ["project", "target"])]
    pub global: bool,

    /// Project root to install into (default: current directory)
    #[arg(long, conflicts_with = "target")]
    pub project: Option<PathBuf>,

    /// Exact install directory, bypassing scope resolution
    #[arg(long)]
    pub target: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a kit or update it to a new version
    Update {
        /// Kit identifier
        kit: String,

        /// Directory holding the kit's files
        source: PathBuf,

        /// Version being installed
        #[arg(long = "kit-version")]
        kit_version: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Accept every hunk of locally edited files without asking
        #[arg(long, conflicts_with = "keep_local")]
        accept_all: bool,

        /// Keep local versions of locally edited files without asking
        #[arg(long)]
        keep_local: bool,
    },

    /// Show ownership of an installed kit's files
    Status {
        /// Kit identifier (default: every installed kit)
        kit: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show how an installed file differs from the shipped version
    Diff {
        /// Directory holding the kit's files
        source: PathBuf,

        /// File path relative to the kit root
        path: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Remove an installed kit, keeping locally edited files
    Uninstall {
        /// Kit identifier
        kit: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print the canonical form of hook commands
    Normalize {
        /// Commands to normalize
        #[arg(required = true)]
        commands: Vec<String>,
    },
}
