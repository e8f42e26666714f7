//! In-memory package database.
//!
//! Backs the unit tests and, through `$KMGR_DB_FIXTURE`, the CLI integration
//! tests. The fixture format is
//!
//! ```json
//! {
//!   "local": [{ "name": "linux", "version": "6.9.1.arch1-1" }],
//!   "repos": [{ "name": "core", "packages": [{ "name": "linux", "version": "6.9.2.arch1-1" }] }]
//! }
//! ```

use super::{
    DbError, DbErrorCode, LOCAL_DB, PackageDatabase, PackageRecord, PendingTransaction,
    open_transaction,
};
use crate::error::TransactionStage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRepo {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<PackageRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryDatabase {
    #[serde(default)]
    local: Vec<PackageRecord>,
    #[serde(default)]
    repos: Vec<MemoryRepo>,
    #[serde(skip)]
    trans: Option<PendingTransaction>,
    #[serde(skip)]
    fail_at: Option<TransactionStage>,
    #[serde(skip)]
    persist_path: Option<PathBuf>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, DbError> {
        let content = fs::read_to_string(path)
            .map_err(|err| DbError::new(DbErrorCode::DbNotFound, format!("{}: {err}", path.display())))?;
        let mut db: Self = serde_json::from_str(&content)
            .map_err(|err| DbError::new(DbErrorCode::DbRead, format!("{}: {err}", path.display())))?;
        for record in &mut db.local {
            record.db = LOCAL_DB.to_string();
        }
        for repo in &mut db.repos {
            for record in &mut repo.packages {
                record.db = repo.name.clone();
            }
        }
        Ok(db)
    }

    /// Write the database back to `path` after every successful commit.
    pub fn persist_to(mut self, path: &Path) -> Self {
        self.persist_path = Some(path.to_path_buf());
        self
    }

    /// Make the given transaction stage fail.
    pub fn fail_at(mut self, stage: TransactionStage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn with_repo(mut self, name: &str, packages: &[(&str, &str)]) -> Self {
        self.repos.push(MemoryRepo {
            name: name.to_string(),
            packages: packages
                .iter()
                .map(|(pkg, version)| PackageRecord::new(*pkg, *version, name))
                .collect(),
        });
        self
    }

    pub fn with_installed(mut self, packages: &[(&str, &str)]) -> Self {
        for (pkg, version) in packages {
            self.install(pkg, version);
        }
        self
    }

    /// Install or replace a package in the local database.
    pub fn install(&mut self, name: &str, version: &str) {
        self.local.retain(|p| p.name != name);
        self.local.push(PackageRecord::new(name, version, LOCAL_DB));
    }

    pub fn uninstall(&mut self, name: &str) -> bool {
        let len = self.local.len();
        self.local.retain(|p| p.name != name);
        self.local.len() < len
    }

    /// Add or replace a package in a repository, creating the repository if needed.
    pub fn publish(&mut self, repo: &str, name: &str, version: &str) {
        let index = match self.repos.iter().position(|r| r.name == repo) {
            Some(index) => index,
            None => {
                self.repos.push(MemoryRepo {
                    name: repo.to_string(),
                    packages: Vec::new(),
                });
                self.repos.len() - 1
            }
        };
        let packages = &mut self.repos[index].packages;
        let record = PackageRecord::new(name, version, repo);
        match packages.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = record,
            None => packages.push(record),
        }
    }

    pub fn transaction(&self) -> Option<&PendingTransaction> {
        self.trans.as_ref()
    }

    fn injected(&self, stage: TransactionStage, code: DbErrorCode) -> Result<(), DbError> {
        if self.fail_at == Some(stage) {
            return Err(DbError::new(code, format!("injected failure at {stage}")));
        }
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), DbError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|err| DbError::new(DbErrorCode::System, err.to_string()))?;
        fs::write(path, content)
            .map_err(|err| DbError::new(DbErrorCode::System, format!("{}: {err}", path.display())))
    }
}

impl PackageDatabase for MemoryDatabase {
    fn repositories(&self) -> Vec<&str> {
        self.repos.iter().map(|r| r.name.as_str()).collect()
    }

    fn sync_packages(&self, repo: &str) -> &[PackageRecord] {
        self.repos
            .iter()
            .find(|r| r.name == repo)
            .map(|r| r.packages.as_slice())
            .unwrap_or(&[])
    }

    fn installed_packages(&self) -> &[PackageRecord] {
        &self.local
    }

    fn trans_init(&mut self) -> Result<(), DbError> {
        self.injected(TransactionStage::Init, DbErrorCode::HandleLock)?;
        if self.trans.is_some() {
            return Err(DbError::new(
                DbErrorCode::TransAlreadyInitialized,
                "a transaction is already open",
            ));
        }
        self.trans = Some(PendingTransaction::default());
        Ok(())
    }

    fn trans_add(&mut self, name: &str) -> Result<(), DbError> {
        self.injected(TransactionStage::Stage, DbErrorCode::PkgNotFound)?;
        if self.find_sync(name).is_none() {
            return Err(DbError::new(DbErrorCode::PkgNotFound, name));
        }
        open_transaction(&mut self.trans)?.stage_add(name);
        Ok(())
    }

    fn trans_remove(&mut self, name: &str) -> Result<(), DbError> {
        self.injected(TransactionStage::Stage, DbErrorCode::PkgNotFound)?;
        if self.installed_package(name).is_none() {
            return Err(DbError::new(DbErrorCode::PkgNotFound, name));
        }
        open_transaction(&mut self.trans)?.stage_remove(name);
        Ok(())
    }

    fn trans_prepare(&mut self) -> Result<(), DbError> {
        self.injected(TransactionStage::Prepare, DbErrorCode::TransPrepare)?;
        open_transaction(&mut self.trans)?.prepared = true;
        Ok(())
    }

    fn trans_commit(&mut self) -> Result<(), DbError> {
        let trans = open_transaction(&mut self.trans)?.clone();
        if !trans.prepared {
            return Err(DbError::new(
                DbErrorCode::TransNotPrepared,
                "commit requested before prepare",
            ));
        }
        self.injected(TransactionStage::Commit, DbErrorCode::TransCommit)?;

        let mut installs = Vec::new();
        for name in &trans.adds {
            let record = self
                .find_sync(name)
                .ok_or_else(|| DbError::new(DbErrorCode::PkgNotFound, name.as_str()))?;
            installs.push((record.name.clone(), record.version.clone()));
        }
        for name in &trans.removes {
            self.uninstall(name);
        }
        for (name, version) in installs {
            self.install(&name, &version);
        }

        if let Some(path) = self.persist_path.clone() {
            self.save(&path)?;
        }
        Ok(())
    }

    fn trans_release(&mut self) -> Result<(), DbError> {
        match self.trans.take() {
            Some(_) => Ok(()),
            None => Err(DbError::new(
                DbErrorCode::TransNotInitialized,
                "no transaction to release",
            )),
        }
    }

    fn release(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryDatabase {
        MemoryDatabase::new()
            .with_repo("cachyos", &[("linux-cachyos", "6.9.2-1"), ("linux-cachyos-headers", "6.9.2-1")])
            .with_repo("core", &[("linux", "6.9.1.arch1-1"), ("linux-cachyos", "6.9.0-1")])
            .with_installed(&[("linux", "6.9.1.arch1-1")])
    }

    #[test]
    fn find_sync_respects_repository_order() {
        let db = sample();
        let record = db.find_sync("linux-cachyos").unwrap();
        assert_eq!(record.db, "cachyos");
        assert_eq!(record.version, "6.9.2-1");
    }

    #[test]
    fn unknown_repository_has_no_packages() {
        assert!(sample().sync_packages("extra").is_empty());
    }

    #[test]
    fn full_cycle_applies_changes() {
        let mut db = sample();
        db.trans_init().unwrap();
        db.trans_add("linux-cachyos").unwrap();
        db.trans_remove("linux").unwrap();
        db.trans_prepare().unwrap();
        db.trans_commit().unwrap();
        db.trans_release().unwrap();

        assert!(db.installed_package("linux").is_none());
        assert_eq!(db.installed_package("linux-cachyos").unwrap().db, LOCAL_DB);
    }

    #[test]
    fn staging_unknown_package_fails() {
        let mut db = sample();
        db.trans_init().unwrap();
        let err = db.trans_add("linux-nope").unwrap_err();
        assert_eq!(err.code, DbErrorCode::PkgNotFound);
        let err = db.trans_remove("linux-cachyos").unwrap_err();
        assert_eq!(err.code, DbErrorCode::PkgNotFound);
    }

    #[test]
    fn double_init_is_rejected() {
        let mut db = sample();
        db.trans_init().unwrap();
        assert_eq!(
            db.trans_init().unwrap_err().code,
            DbErrorCode::TransAlreadyInitialized
        );
    }

    #[test]
    fn commit_requires_prepare() {
        let mut db = sample();
        db.trans_init().unwrap();
        db.trans_add("linux-cachyos").unwrap();
        assert_eq!(db.trans_commit().unwrap_err().code, DbErrorCode::TransNotPrepared);
    }

    #[test]
    fn injected_commit_failure_changes_nothing() {
        let mut db = sample().fail_at(TransactionStage::Commit);
        db.trans_init().unwrap();
        db.trans_remove("linux").unwrap();
        db.trans_prepare().unwrap();
        assert_eq!(db.trans_commit().unwrap_err().code, DbErrorCode::TransCommit);
        assert!(db.installed_package("linux").is_some());
    }

    #[test]
    fn fixture_round_trips_through_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("db.json");
        fs::write(
            &path,
            r#"{"local": [{"name": "linux", "version": "6.9.1-1"}],
                "repos": [{"name": "core", "packages": [{"name": "linux-lts", "version": "6.6.30-1"}]}]}"#,
        )
        .unwrap();

        let mut db = MemoryDatabase::load(&path).unwrap().persist_to(&path);
        assert_eq!(db.installed_package("linux").unwrap().db, LOCAL_DB);
        db.trans_init().unwrap();
        db.trans_add("linux-lts").unwrap();
        db.trans_prepare().unwrap();
        db.trans_commit().unwrap();
        db.trans_release().unwrap();

        let reloaded = MemoryDatabase::load(&path).unwrap();
        assert!(reloaded.installed_package("linux-lts").is_some());
        assert_eq!(reloaded.find_sync("linux-lts").unwrap().db, "core");
    }

    #[test]
    fn missing_fixture_is_db_not_found() {
        let err = MemoryDatabase::load(Path::new("/nonexistent/db.json")).unwrap_err();
        assert_eq!(err.code, DbErrorCode::DbNotFound);
    }
}
