//! CLI argument definitions for kmgr.
//!
//! Kept out of `main.rs` so that shell completion generation can reference
//! these types.

use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "kmgr")]
#[command(about = "Kernel manager - browse, install and build kernel packages")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show what would be done without making changes
    #[arg(long, short = 'n', global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List available and installed kernels
    #[command(alias = "ls")]
    List(commands::list::ListArgs),

    /// Install kernels (with their headers) in one transaction
    Install(commands::transaction::InstallArgs),

    /// Remove kernels (with their headers and modules) in one transaction
    #[command(alias = "rm")]
    Remove(commands::transaction::RemoveArgs),

    /// Install and remove kernels in a single transaction
    Apply(commands::transaction::ApplyArgs),

    /// Clone or refresh the kernel build recipes
    Prepare,

    /// Build a kernel from its recipe in a terminal
    Build(commands::build::BuildArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}
