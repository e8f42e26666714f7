//! Per-invocation session state.
//!
//! A [`Session`] bundles what every command needs: the loaded configuration,
//! the dry-run flag, the command runner, the cancellation token wired to
//! Ctrl-C and the transaction coordinator holding the worklists. It is
//! created once in `main` and passed by reference.

use crate::cli::Cli;
use crate::command_runner::{CommandRunner, RealCommandRunner};
use crate::config::KmConfig;
use crate::db::{self, PackageDatabase};
use crate::error::KmError;
use crate::transaction::TransactionCoordinator;
use crate::worker::CancelToken;
use std::sync::Arc;

pub struct Session {
    pub config: KmConfig,
    pub dry_run: bool,
    pub cancel: CancelToken,
    runner: Arc<dyn CommandRunner>,
    coordinator: Arc<TransactionCoordinator>,
}

impl Session {
    pub fn from_cli(cli: &Cli, config: KmConfig) -> Self {
        Self::new(config, cli.dry_run, Arc::new(RealCommandRunner))
    }

    pub fn new(config: KmConfig, dry_run: bool, runner: Arc<dyn CommandRunner>) -> Self {
        let coordinator = Arc::new(TransactionCoordinator::new(
            config.naming.clone(),
            config.with_headers,
        ));
        Self {
            config,
            dry_run,
            cancel: CancelToken::new(),
            runner,
            coordinator,
        }
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    pub fn open_database(&self) -> Result<Box<dyn PackageDatabase>, KmError> {
        db::open(&self.config, self.runner())
    }

    /// The session's coordinator; every handle shares the same worklists.
    pub fn coordinator(&self) -> Arc<TransactionCoordinator> {
        Arc::clone(&self.coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn from_cli_carries_dry_run() {
        let cli = Cli::parse_from(["kmgr", "--dry-run", "prepare"]);
        let session = Session::from_cli(&cli, KmConfig::default());
        assert!(session.dry_run);
        assert!(!session.cancel.is_cancelled());
    }

    #[test]
    fn coordinator_follows_config() {
        let config = KmConfig {
            with_headers: false,
            ..Default::default()
        };
        let session = Session::new(config, false, Arc::new(RealCommandRunner));
        assert!(session.coordinator().is_empty());
    }

    #[test]
    fn coordinator_is_shared_across_the_session() {
        let session = Session::new(KmConfig::default(), false, Arc::new(RealCommandRunner));
        session.coordinator().add_to_install_list("linux-zen");
        assert_eq!(session.coordinator().install_list(), vec!["linux-zen"]);
    }
}
