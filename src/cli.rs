// src/cli.rs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::fco::EntityType;

/// Data-protection orchestrator for virtualization first-class objects.
///
/// `config.yaml` is the primary source of truth.
/// CLI flags only override config values.
#[derive(Parser, Debug)]
#[command(
    name = "vmkeeper",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Target selection flags shared by every operation command.
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Path to config file
    ///
    /// Defaults to ./config.yaml
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Select by name or uuid (can be passed multiple times)
    ///
    /// Example:
    /// --name web-01 --name db-02
    #[arg(long)]
    pub name: Vec<String>,

    /// Select by tag (can be passed multiple times)
    #[arg(long)]
    pub tag: Vec<String>,

    /// Restrict to one entity kind
    ///
    /// Allowed values: vm | ivd | vapp | namespace
    #[arg(long = "type", value_name = "TYPE")]
    pub entity_type: Option<EntityType>,

    /// Select every inventory entry (still narrowed by --type)
    #[arg(long)]
    pub all: bool,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive a new full generation of the selected FCOs.
    Backup {
        #[command(flatten)]
        select: SelectArgs,
    },

    /// Restore the selected FCOs from the archive.
    Restore {
        #[command(flatten)]
        select: SelectArgs,

        /// Generation to restore; defaults to the latest.
        #[arg(long)]
        generation: Option<u32>,
    },

    /// Consolidate existing generations into a new one without touching
    /// the live entity.
    VirtualBackup {
        #[command(flatten)]
        select: SelectArgs,
    },

    /// Archive maintenance.
    #[command(subcommand)]
    Archive(ArchiveCommand),

    /// List archived generations per selected FCO.
    Show {
        #[command(flatten)]
        select: SelectArgs,
    },

    /// Summarize archive status per selected FCO.
    Status {
        #[command(flatten)]
        select: SelectArgs,
    },

    /// Run the HTTP API server.
    Serve {
        /// Path to config file
        ///
        /// Defaults to ./config.yaml
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Override the bind address from config.yaml
        ///
        /// Example:
        /// --addr 0.0.0.0:8974
        #[arg(long)]
        addr: Option<String>,
    },

    /// Initialise a project scaffold.
    ///
    /// Creates:
    /// - config.yaml with a sample inventory
    /// - the archive directory
    Init,
}

/// Archive maintenance subcommands.
#[derive(Subcommand, Debug)]
pub enum ArchiveCommand {
    /// Validate archived generations of the selected FCOs.
    Check {
        #[command(flatten)]
        select: SelectArgs,
    },

    /// Prune old generations beyond the retention count.
    Remove {
        #[command(flatten)]
        select: SelectArgs,

        /// Generations to keep; defaults to options.keep_generations.
        #[arg(long)]
        keep: Option<u32>,

        /// Report what would be removed without touching the archive.
        #[arg(long)]
        dry_run: bool,
    },
}

impl SelectArgs {
    pub fn filter(&self) -> crate::fco::TargetFilter {
        crate::fco::TargetFilter {
            entity_type: self.entity_type,
            names: self.name.clone(),
            tags: self.tag.clone(),
            all: self.all,
        }
    }
}
