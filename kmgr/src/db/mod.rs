//! Package database client.
//!
//! [`PackageDatabase`] is the seam between kmgr and the system package
//! database: lookups of installed and repository packages plus the
//! init/stage/prepare/commit/release transaction cycle. Two backends exist:
//! [`pacman::PacmanDatabase`] reads the on-disk pacman databases and commits
//! through the `pacman` binary, [`memory::MemoryDatabase`] keeps everything in
//! memory (tests, fixtures, CI).

pub mod memory;
pub mod pacman;

use crate::command_runner::CommandRunner;
use crate::config::KmConfig;
use crate::error::KmError;
use kmgr_common::desc::DescRecord;
use kmgr_common::error::CommonError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryDatabase;
pub use pacman::PacmanDatabase;

/// Name of the database holding installed packages.
pub const LOCAL_DB: &str = "local";

/// Explicit database override (for testing and CI): path to a JSON fixture
/// loaded into a [`MemoryDatabase`].
pub const FIXTURE_ENV: &str = "KMGR_DB_FIXTURE";

/// One package as seen by a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    /// Package base (the recipe the package was built from).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Database the record was read from.
    #[serde(default, skip_serializing)]
    pub db: String,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            base: None,
            description: None,
            db: db.into(),
        }
    }

    pub fn from_desc(desc: &DescRecord, db: &str) -> Result<Self, CommonError> {
        Ok(Self {
            name: desc.name()?.to_string(),
            version: desc.version()?.to_string(),
            base: desc.base().map(str::to_string),
            description: desc.description().map(str::to_string),
            db: db.to_string(),
        })
    }
}

/// Structured package database error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    NotADirectory,
    DbNotFound,
    DbRead,
    HandleLock,
    PkgNotFound,
    TransNotInitialized,
    TransAlreadyInitialized,
    TransNotPrepared,
    TransPrepare,
    TransCommit,
    /// The commit failed after part of it had been applied.
    TransPartialCommit,
    System,
}

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DbErrorCode::NotADirectory => "could not find or read directory",
            DbErrorCode::DbNotFound => "could not find database",
            DbErrorCode::DbRead => "could not read database",
            DbErrorCode::HandleLock => "unable to lock database",
            DbErrorCode::PkgNotFound => "could not find or read package",
            DbErrorCode::TransNotInitialized => "transaction not initialized",
            DbErrorCode::TransAlreadyInitialized => "transaction already initialized",
            DbErrorCode::TransNotPrepared => "transaction not prepared",
            DbErrorCode::TransPrepare => "failed to prepare transaction",
            DbErrorCode::TransCommit => "failed to commit transaction",
            DbErrorCode::TransPartialCommit => "transaction only partially committed",
            DbErrorCode::System => "system error",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {detail}")]
pub struct DbError {
    pub code: DbErrorCode,
    pub detail: String,
}

impl DbError {
    pub fn new(code: DbErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

/// Query and transaction primitives of a package database handle.
///
/// The handle is released exactly once through [`PackageDatabase::release`],
/// which consumes it.
pub trait PackageDatabase: Send {
    /// Name of the database holding installed packages.
    fn local_db_name(&self) -> &str {
        LOCAL_DB
    }

    /// Repository names in search order.
    fn repositories(&self) -> Vec<&str>;

    /// Packages of one repository in database order; empty for unknown repositories.
    fn sync_packages(&self, repo: &str) -> &[PackageRecord];

    fn sync_package(&self, repo: &str, name: &str) -> Option<&PackageRecord> {
        self.sync_packages(repo).iter().find(|p| p.name == name)
    }

    fn installed_packages(&self) -> &[PackageRecord];

    fn installed_package(&self, name: &str) -> Option<&PackageRecord> {
        self.installed_packages().iter().find(|p| p.name == name)
    }

    /// First repository in search order offering `name`.
    fn find_sync(&self, name: &str) -> Option<&PackageRecord> {
        self.repositories()
            .into_iter()
            .find_map(|repo| self.sync_package(repo, name))
    }

    fn trans_init(&mut self) -> Result<(), DbError>;
    /// Stage a repository package for installation.
    fn trans_add(&mut self, name: &str) -> Result<(), DbError>;
    /// Stage an installed package for removal.
    fn trans_remove(&mut self, name: &str) -> Result<(), DbError>;
    fn trans_prepare(&mut self) -> Result<(), DbError>;
    fn trans_commit(&mut self) -> Result<(), DbError>;
    fn trans_release(&mut self) -> Result<(), DbError>;

    /// Release the handle, dropping any transaction still open.
    fn release(self: Box<Self>) -> Result<(), DbError>;
}

/// Names staged in an open transaction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub adds: Vec<String>,
    pub removes: Vec<String>,
    pub prepared: bool,
}

impl PendingTransaction {
    pub fn stage_add(&mut self, name: &str) {
        if !self.adds.iter().any(|n| n == name) {
            self.adds.push(name.to_string());
        }
        self.prepared = false;
    }

    pub fn stage_remove(&mut self, name: &str) {
        if !self.removes.iter().any(|n| n == name) {
            self.removes.push(name.to_string());
        }
        self.prepared = false;
    }
}

pub(crate) fn open_transaction(
    trans: &mut Option<PendingTransaction>,
) -> Result<&mut PendingTransaction, DbError> {
    trans.as_mut().ok_or_else(|| {
        DbError::new(
            DbErrorCode::TransNotInitialized,
            "no transaction has been initialized",
        )
    })
}

/// Open the package database named by the configuration.
///
/// `$KMGR_DB_FIXTURE` takes precedence and selects the in-memory backend.
pub fn open(
    config: &KmConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn PackageDatabase>, KmError> {
    if let Ok(fixture) = std::env::var(FIXTURE_ENV) {
        let path = Path::new(&fixture);
        tracing::debug!("Using fixture database {}", path.display());
        let db = MemoryDatabase::load(path).map_err(|source| KmError::DbOpen {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(Box::new(db.persist_to(path)));
    }

    let db = PacmanDatabase::open(
        &config.root,
        &config.db_path,
        &config.pacman_conf,
        &config.escalation,
        runner,
    )
    .map_err(|source| KmError::DbOpen {
        path: config.db_path.clone(),
        source,
    })?;
    Ok(Box::new(db))
}
