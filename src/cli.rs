//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API.
//! `resolve` is the main entry point; the other subcommands expose the
//! individual inputs (changed paths, inventory, path categories) for
//! inspection.

use crate::changes::{ChangedPath, parse_change};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Work out which environments and applications need re-rendering.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Print additional diagnostics to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that reads the repository.
#[derive(Debug, Clone, clap::Args)]
pub struct RepoArgs {
    /// Repository root. Defaults to current directory.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Conventions file. Defaults to `.impact-scope.yaml` in the root, if present.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Options controlling where changed paths come from.
#[derive(Debug, Clone, clap::Args)]
pub struct ChangeArgs {
    /// Git ref to diff against (e.g., HEAD^, main). Without it, the merge base
    /// with the main branch is used in CI and HEAD elsewhere.
    #[arg(long, conflicts_with = "no_diff")]
    pub base: Option<String>,

    /// Only consider uncommitted working tree changes.
    #[arg(long)]
    pub no_diff: bool,

    /// Explicit changes in `STATUS:path` format (e.g., `M:envs/prod/env-data.ytt.yaml`).
    /// Bypasses git entirely.
    #[arg(long = "change", value_parser = parse_change)]
    pub changes: Vec<ChangedPath>,
}

/// Options controlling how the inventory is collected.
#[derive(Debug, Clone, clap::Args)]
pub struct InventoryArgs {
    /// Environments loaded in parallel. 0 loads them sequentially.
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Glob patterns for environment directories to exclude (e.g., "scratch", "envs/legacy/*").
    /// Entries starting with `.` or `_` are always excluded.
    #[arg(short, long)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report the environments and applications affected by the current changes.
    Resolve {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        changes: ChangeArgs,

        #[command(flatten)]
        inventory: InventoryArgs,

        /// Do not add applications missing from the rendered output.
        #[arg(long)]
        no_missing: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// List changed paths with their status.
    Changes {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        changes: ChangeArgs,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Print environments and the applications they declare.
    Inventory {
        #[command(flatten)]
        repo: RepoArgs,

        #[command(flatten)]
        inventory: InventoryArgs,

        /// Mark applications that have no rendered output.
        #[arg(long)]
        missing: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Show which category each path falls into.
    Classify {
        #[command(flatten)]
        repo: RepoArgs,

        /// Repository-relative paths to classify.
        #[arg(required = true)]
        paths: Vec<String>,
    },
}
