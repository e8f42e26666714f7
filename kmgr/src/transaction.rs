//! Install/removal worklists and their commit as one package transaction.
//!
//! A [`TransactionCoordinator`] is created once per session and shared by
//! reference. List mutations hold the list lock only briefly; commits are
//! serialised by a separate gate and work on a snapshot of the lists, so a
//! name queued while a commit is in flight waits for the next commit.

use crate::catalog::KernelNaming;
use crate::db::{DbErrorCode, PackageDatabase};
use crate::error::{KmError, TransactionStage};
use crate::worker::CancelToken;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Worklists {
    install: Vec<String>,
    removal: Vec<String>,
}

/// Everything a successful commit staged, companions included.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub installed: Vec<String>,
    pub removed: Vec<String>,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.removed.is_empty()
    }
}

pub struct TransactionCoordinator {
    lists: Mutex<Worklists>,
    commit_gate: Mutex<()>,
    naming: KernelNaming,
    with_headers: bool,
}

impl TransactionCoordinator {
    pub fn new(naming: KernelNaming, with_headers: bool) -> Self {
        Self {
            lists: Mutex::new(Worklists::default()),
            commit_gate: Mutex::new(()),
            naming,
            with_headers,
        }
    }

    fn lists(&self) -> MutexGuard<'_, Worklists> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `name` for installation, dropping any pending removal of it.
    pub fn add_to_install_list(&self, name: &str) {
        let mut lists = self.lists();
        lists.removal.retain(|n| n != name);
        if !lists.install.iter().any(|n| n == name) {
            lists.install.push(name.to_string());
        }
    }

    /// Queue `name` for removal, dropping any pending installation of it.
    pub fn add_to_removal_list(&self, name: &str) {
        let mut lists = self.lists();
        lists.install.retain(|n| n != name);
        if !lists.removal.iter().any(|n| n == name) {
            lists.removal.push(name.to_string());
        }
    }

    /// Drop `name` from both lists. Returns whether it was queued.
    pub fn unmark(&self, name: &str) -> bool {
        let mut lists = self.lists();
        let before = lists.install.len() + lists.removal.len();
        lists.install.retain(|n| n != name);
        lists.removal.retain(|n| n != name);
        lists.install.len() + lists.removal.len() < before
    }

    pub fn install_list(&self) -> Vec<String> {
        self.lists().install.clone()
    }

    pub fn removal_list(&self) -> Vec<String> {
        self.lists().removal.clone()
    }

    pub fn is_empty(&self) -> bool {
        let lists = self.lists();
        lists.install.is_empty() && lists.removal.is_empty()
    }

    /// Commit the queued operations as a single transaction.
    ///
    /// On success the committed entries are removed from the worklists. When
    /// the database reports a partial commit, the entries it did persist are
    /// removed and [`KmError::PartialCommit`] names them. Any other failure
    /// leaves the worklists exactly as they were.
    pub fn commit(
        &self,
        db: &mut dyn PackageDatabase,
        cancel: &CancelToken,
    ) -> Result<CommitSummary, KmError> {
        let _gate = self
            .commit_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.lists().clone();

        if snapshot.install.is_empty() && snapshot.removal.is_empty() {
            debug!("Nothing queued, skipping transaction");
            return Ok(CommitSummary::default());
        }
        if cancel.is_cancelled() {
            return Err(KmError::Cancelled {
                operation: "transaction",
            });
        }

        db.trans_init().map_err(|source| KmError::Transaction {
            stage: TransactionStage::Init,
            source,
        })?;
        let result = self.stage_and_commit(db, &snapshot, cancel);
        if let Err(err) = db.trans_release() {
            warn!("Failed to release transaction: {}", err);
        }
        let summary = match result {
            Ok(summary) => summary,
            Err(KmError::Transaction {
                stage: TransactionStage::Commit,
                source,
            }) if source.code == DbErrorCode::TransPartialCommit => {
                let (installed, removed) = self.prune_persisted(db, &snapshot);
                warn!(?installed, ?removed, "Transaction partially committed");
                return Err(KmError::PartialCommit {
                    installed,
                    removed,
                    source,
                });
            }
            Err(err) => return Err(err),
        };

        let mut lists = self.lists();
        lists.install.retain(|n| !snapshot.install.contains(n));
        lists.removal.retain(|n| !snapshot.removal.contains(n));
        info!(
            installed = summary.installed.len(),
            removed = summary.removed.len(),
            "Transaction committed"
        );
        Ok(summary)
    }

    /// Drop snapshot entries whose outcome the database already shows.
    fn prune_persisted(
        &self,
        db: &dyn PackageDatabase,
        snapshot: &Worklists,
    ) -> (Vec<String>, Vec<String>) {
        let installed: Vec<String> = snapshot
            .install
            .iter()
            .filter(|n| db.installed_package(n).is_some())
            .cloned()
            .collect();
        let removed: Vec<String> = snapshot
            .removal
            .iter()
            .filter(|n| db.installed_package(n).is_none())
            .cloned()
            .collect();

        let mut lists = self.lists();
        lists.install.retain(|n| !installed.contains(n));
        lists.removal.retain(|n| !removed.contains(n));
        (installed, removed)
    }

    fn stage_and_commit(
        &self,
        db: &mut dyn PackageDatabase,
        snapshot: &Worklists,
        cancel: &CancelToken,
    ) -> Result<CommitSummary, KmError> {
        let staging = |source| KmError::Transaction {
            stage: TransactionStage::Stage,
            source,
        };
        let mut summary = CommitSummary::default();

        for name in &snapshot.removal {
            db.trans_remove(name).map_err(staging)?;
            summary.removed.push(name.clone());
            for companion in self.naming.companions(name) {
                if db.installed_package(&companion).is_some() {
                    db.trans_remove(&companion).map_err(staging)?;
                    summary.removed.push(companion);
                }
            }
        }

        for name in &snapshot.install {
            db.trans_add(name).map_err(staging)?;
            summary.installed.push(name.clone());
            if self.with_headers {
                let headers = self.naming.headers_name(name);
                if db.find_sync(&headers).is_some() {
                    db.trans_add(&headers).map_err(staging)?;
                    summary.installed.push(headers);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(KmError::Cancelled {
                operation: "transaction",
            });
        }

        db.trans_prepare().map_err(|source| KmError::Transaction {
            stage: TransactionStage::Prepare,
            source,
        })?;
        db.trans_commit().map_err(|source| KmError::Transaction {
            stage: TransactionStage::Commit,
            source,
        })?;
        if cancel.is_cancelled() {
            warn!("Cancellation requested after prepare began; the transaction was completed");
        }
        Ok(summary)
    }
}
