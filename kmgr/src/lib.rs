//! kmgr - kernel manager
//!
//! Discovers which kernel packages exist, which are installed and which have
//! updates, queues install/removal choices and commits them as one package
//! transaction, and prepares the recipe checkout and environment for building
//! kernels from source.
//!
//! # Layers
//!
//! - [`db`]: package database access (pacman on disk, or in memory)
//! - [`catalog`] and [`classify`]: the kernel list and its release categories
//! - [`transaction`]: install/removal worklists and their commit
//! - [`build_env`], [`env_scope`] and [`terminal`]: source builds
//! - [`worker`]: background jobs and cooperative cancellation

pub mod build_env;
pub mod catalog;
pub mod classify;
pub mod cli;
pub mod command_runner;
pub mod commands;
pub mod config;
pub mod db;
pub mod env_scope;
pub mod error;
pub mod output;
pub mod session;
pub mod terminal;
pub mod transaction;
pub mod vercmp;
pub mod worker;

pub use cli::{Cli, Commands};
pub use error::KmError;
