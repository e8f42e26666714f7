//! Install, remove and apply commands.
//!
//! All three mark the session's worklists and commit them as one
//! transaction. Names are checked against the catalog before anything is
//! marked, so a typo never reaches the package database.

use crate::catalog::CatalogSnapshot;
use crate::error::KmError;
use crate::output::Output;
use crate::session::Session;
use crate::transaction::TransactionCoordinator;
use crate::worker::Worker;
use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Kernel package names
    #[arg(required = true)]
    pub kernels: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Kernel package names
    #[arg(required = true)]
    pub kernels: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Kernels to install
    #[arg(long = "install", short = 'i', num_args = 1..)]
    pub install: Vec<String>,

    /// Kernels to remove
    #[arg(long = "remove", short = 'r', num_args = 1..)]
    pub remove: Vec<String>,
}

pub fn install(args: InstallArgs, session: &Session) -> Result<()> {
    run(&args.kernels, &[], session)
}

pub fn remove(args: RemoveArgs, session: &Session) -> Result<()> {
    run(&[], &args.kernels, session)
}

pub fn apply(args: ApplyArgs, session: &Session) -> Result<()> {
    if args.install.is_empty() && args.remove.is_empty() {
        bail!("Nothing to do: pass --install and/or --remove");
    }
    run(&args.install, &args.remove, session)
}

fn check_removable(snapshot: &CatalogSnapshot, names: &[String]) -> Result<()> {
    for name in names {
        if snapshot.find(name).is_some_and(|k| !k.is_installed()) {
            bail!("Kernel '{}' is not installed", name);
        }
    }
    Ok(())
}

/// Mark the worklists in argument order; a later mark wins over an earlier one.
fn mark(coordinator: &TransactionCoordinator, install: &[String], remove: &[String]) {
    for name in install {
        coordinator.add_to_install_list(name);
    }
    for name in remove {
        coordinator.add_to_removal_list(name);
    }
}

fn run(install: &[String], remove: &[String], session: &Session) -> Result<()> {
    let (mut db, snapshot) = super::load_catalog(session)?;
    let checked = super::require_known(&snapshot, install)
        .and_then(|()| super::require_known(&snapshot, remove))
        .map_err(anyhow::Error::from)
        .and_then(|()| check_removable(&snapshot, remove));
    if let Err(err) = checked {
        super::release(db);
        return Err(err);
    }

    let coordinator = session.coordinator();
    mark(&coordinator, install, remove);

    if session.dry_run {
        for name in coordinator.removal_list() {
            Output::dry_run(format!("Would remove: {name}"));
        }
        for name in coordinator.install_list() {
            Output::dry_run(format!("Would install: {name}"));
        }
        super::release(db);
        return Ok(());
    }

    let cancel = session.cancel.clone();
    let spinner = Output::spinner("Committing transaction...");
    let committer = Arc::clone(&coordinator);
    let job = Worker::spawn("kmgr-commit", move || {
        let result = committer.commit(db.as_mut(), &cancel);
        (db, result)
    })
    .context("Failed to start transaction worker")?;
    let (db, result) = job
        .wait()
        .ok_or_else(|| anyhow!("Transaction worker exited without a result"))?;
    super::release(db);

    match result {
        Ok(summary) => {
            spinner.finish_success("Transaction committed");
            for name in &summary.removed {
                Output::step(format!("removed {name}"));
            }
            for name in &summary.installed {
                Output::step(format!("installed {name}"));
            }
            Ok(())
        }
        Err(err) => {
            spinner.finish_error("Transaction failed");
            if let KmError::PartialCommit {
                installed, removed, ..
            } = &err
            {
                for name in removed {
                    Output::step(format!("removed {name}"));
                }
                for name in installed {
                    Output::step(format!("installed {name}"));
                }
            }
            let pending = pending_items(&coordinator);
            if let Some(headline) = pending_headline(&err) {
                if !pending.is_empty() {
                    Output::hint(headline);
                    for item in pending {
                        Output::list_item(item);
                    }
                }
            }
            Err(err.into())
        }
    }
}

fn pending_items(coordinator: &TransactionCoordinator) -> Vec<String> {
    coordinator
        .removal_list()
        .into_iter()
        .map(|n| format!("remove {n}"))
        .chain(coordinator.install_list().into_iter().map(|n| format!("install {n}")))
        .collect()
}

/// Line printed above the still-pending entries after a failed commit.
fn pending_headline(err: &KmError) -> Option<&'static str> {
    match err {
        KmError::PartialCommit { .. } => Some("Some changes were applied. Still pending:"),
        err if err.is_recoverable() => Some("Nothing was changed. Still pending:"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{KernelNaming, build_catalog};
    use crate::db::{DbError, DbErrorCode, MemoryDatabase};
    use crate::error::TransactionStage;

    #[test]
    fn mark_keeps_names_exclusive() {
        let coordinator = TransactionCoordinator::new(KernelNaming::default(), true);
        mark(
            &coordinator,
            &["linux-zen".to_string(), "linux-lts".to_string()],
            &["linux-zen".to_string()],
        );
        assert_eq!(coordinator.install_list(), vec!["linux-lts"]);
        assert_eq!(coordinator.removal_list(), vec!["linux-zen"]);
    }

    #[test]
    fn removing_a_kernel_that_is_not_installed_is_rejected() {
        let db = MemoryDatabase::new()
            .with_repo("core", &[("linux", "6.9.2.arch1-1"), ("linux-lts", "6.6.32-1")])
            .with_installed(&[("linux", "6.9.1.arch1-1")]);
        let snapshot = build_catalog(&db, &KernelNaming::default());

        assert!(check_removable(&snapshot, &["linux".to_string()]).is_ok());
        let err = check_removable(&snapshot, &["linux-lts".to_string()]).unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }

    #[test]
    fn partial_commit_is_not_reported_as_unchanged() {
        let partial = KmError::PartialCommit {
            installed: vec!["linux-cachyos".to_string()],
            removed: Vec::new(),
            source: DbError::new(DbErrorCode::TransPartialCommit, "removal failed"),
        };
        assert_eq!(
            pending_headline(&partial),
            Some("Some changes were applied. Still pending:")
        );
        assert!(partial.to_string().contains("installed linux-cachyos"));

        let untouched = KmError::Transaction {
            stage: TransactionStage::Commit,
            source: DbError::new(DbErrorCode::TransCommit, "exited with 1"),
        };
        assert_eq!(
            pending_headline(&untouched),
            Some("Nothing was changed. Still pending:")
        );
        assert_eq!(
            pending_headline(&KmError::UnknownKernel {
                name: "linux-nope".to_string()
            }),
            None
        );
    }

    #[test]
    fn pending_items_list_removals_first() {
        let coordinator = TransactionCoordinator::new(KernelNaming::default(), true);
        mark(&coordinator, &["linux-zen".to_string()], &["linux".to_string()]);
        assert_eq!(pending_items(&coordinator), vec!["remove linux", "install linux-zen"]);
    }
}
