//! Pacman-backed package database.
//!
//! Reads the local database (`<db_path>/local/<pkg>-<ver>/desc`), the
//! repository list from `pacman.conf`, and the sync databases
//! (`<db_path>/sync/<repo>.db`). Transactions are committed by running
//! `pacman` through the configured escalation wrapper.

use super::{
    DbError, DbErrorCode, LOCAL_DB, PackageDatabase, PackageRecord, PendingTransaction,
    open_transaction,
};
use crate::command_runner::{CommandOptions, CommandRunner, display_command};
use kmgr_common::archive::read_archive_file;
use kmgr_common::desc::DescRecord;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Packages of one database plus a name index.
#[derive(Debug, Default)]
struct PackageSet {
    packages: Vec<PackageRecord>,
    index: HashMap<String, usize>,
}

impl PackageSet {
    fn new(packages: Vec<PackageRecord>) -> Self {
        let index = packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        Self { packages, index }
    }

    fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.index.get(name).map(|&i| &self.packages[i])
    }
}

pub struct PacmanDatabase {
    root: PathBuf,
    db_path: PathBuf,
    config_path: PathBuf,
    escalation: String,
    runner: Arc<dyn CommandRunner>,
    local: PackageSet,
    repos: Vec<(String, PackageSet)>,
    trans: Option<PendingTransaction>,
}

impl PacmanDatabase {
    pub fn open(
        root: &Path,
        db_path: &Path,
        config_path: &Path,
        escalation: &str,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, DbError> {
        if !db_path.is_dir() {
            return Err(DbError::new(
                DbErrorCode::NotADirectory,
                db_path.display().to_string(),
            ));
        }
        let local = PackageSet::new(read_local_db(&db_path.join(LOCAL_DB))?);

        let repo_names = match fs::read_to_string(config_path) {
            Ok(content) => parse_repo_sections(&content),
            Err(err) => {
                warn!(
                    "Could not read {}: {}; no repositories registered",
                    config_path.display(),
                    err
                );
                Vec::new()
            }
        };

        let mut repos = Vec::with_capacity(repo_names.len());
        for name in repo_names {
            let path = db_path.join("sync").join(format!("{name}.db"));
            let packages = match read_sync_db(&path, &name) {
                Ok(packages) => packages,
                Err(err) => {
                    warn!("Skipping repository '{}': {}", name, err);
                    Vec::new()
                }
            };
            debug!(repo = %name, packages = packages.len(), "Loaded sync database");
            repos.push((name, PackageSet::new(packages)));
        }

        Ok(Self {
            root: root.to_path_buf(),
            db_path: db_path.to_path_buf(),
            config_path: config_path.to_path_buf(),
            escalation: escalation.to_string(),
            runner,
            local,
            repos,
            trans: None,
        })
    }

    fn reload_local(&mut self) -> Result<(), DbError> {
        self.local = PackageSet::new(read_local_db(&self.db_path.join(LOCAL_DB))?);
        Ok(())
    }

    /// Arguments for one pacman invocation, without the program name.
    fn pacman_args(&self, operation: &str, names: &[String]) -> Vec<String> {
        let mut args = vec![operation.to_string(), "--noconfirm".to_string()];
        if self.root != Path::new("/") {
            args.push("--root".to_string());
            args.push(self.root.display().to_string());
        }
        args.push("--dbpath".to_string());
        args.push(self.db_path.display().to_string());
        args.push("--config".to_string());
        args.push(self.config_path.display().to_string());
        args.extend(names.iter().cloned());
        args
    }

    fn run_pacman(&self, operation: &str, names: &[String]) -> Result<(), DbError> {
        let pacman_args = self.pacman_args(operation, names);
        let (program, args): (&str, Vec<&str>) = if self.escalation.is_empty() {
            ("pacman", pacman_args.iter().map(String::as_str).collect())
        } else {
            let mut args = vec!["pacman"];
            args.extend(pacman_args.iter().map(String::as_str));
            (self.escalation.as_str(), args)
        };

        let command = display_command(program, &args);
        let status = self
            .runner
            .run_status(program, &args, &CommandOptions::default())
            .map_err(|err| DbError::new(DbErrorCode::TransCommit, format!("{command}: {err}")))?;
        if !status.success() {
            return Err(DbError::new(
                DbErrorCode::TransCommit,
                format!("{command} exited with {}", status.code().unwrap_or(-1)),
            ));
        }
        Ok(())
    }
}

impl PackageDatabase for PacmanDatabase {
    fn repositories(&self) -> Vec<&str> {
        self.repos.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn sync_packages(&self, repo: &str) -> &[PackageRecord] {
        self.repos
            .iter()
            .find(|(name, _)| name == repo)
            .map(|(_, set)| set.packages.as_slice())
            .unwrap_or(&[])
    }

    fn sync_package(&self, repo: &str, name: &str) -> Option<&PackageRecord> {
        self.repos
            .iter()
            .find(|(repo_name, _)| repo_name == repo)
            .and_then(|(_, set)| set.get(name))
    }

    fn installed_packages(&self) -> &[PackageRecord] {
        &self.local.packages
    }

    fn installed_package(&self, name: &str) -> Option<&PackageRecord> {
        self.local.get(name)
    }

    fn trans_init(&mut self) -> Result<(), DbError> {
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
        if self.find_sync(name).is_none() {
            return Err(DbError::new(DbErrorCode::PkgNotFound, name));
        }
        open_transaction(&mut self.trans)?.stage_add(name);
        Ok(())
    }

    fn trans_remove(&mut self, name: &str) -> Result<(), DbError> {
        if self.installed_package(name).is_none() {
            return Err(DbError::new(DbErrorCode::PkgNotFound, name));
        }
        open_transaction(&mut self.trans)?.stage_remove(name);
        Ok(())
    }

    fn trans_prepare(&mut self) -> Result<(), DbError> {
        let lock = self.db_path.join("db.lck");
        if lock.exists() {
            return Err(DbError::new(
                DbErrorCode::HandleLock,
                format!("{} exists; is another package manager running?", lock.display()),
            ));
        }
        let trans = open_transaction(&mut self.trans)?.clone();
        if let Some(missing) = trans.adds.iter().find(|name| self.find_sync(name).is_none()) {
            return Err(DbError::new(DbErrorCode::PkgNotFound, missing.as_str()));
        }
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

        // Installs first: a failed install must never leave the system without a kernel.
        if !trans.adds.is_empty() {
            self.run_pacman("-S", &trans.adds)?;
        }
        if !trans.removes.is_empty() {
            if let Err(err) = self.run_pacman("-R", &trans.removes) {
                if trans.adds.is_empty() {
                    return Err(err);
                }
                if let Err(reload) = self.reload_local() {
                    warn!("Could not re-read local database: {}", reload);
                }
                return Err(DbError::new(
                    DbErrorCode::TransPartialCommit,
                    format!("installed {}; removal failed: {}", trans.adds.join(", "), err.detail),
                ));
            }
        }
        self.reload_local()
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

    fn release(mut self: Box<Self>) -> Result<(), DbError> {
        if self.trans.is_some() {
            warn!("Releasing database handle with an open transaction");
            self.trans = None;
        }
        Ok(())
    }
}

/// Repository section names of a pacman.conf, in file order.
pub fn parse_repo_sections(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "options")
        .map(str::to_string)
        .collect()
}

fn read_local_db(dir: &Path) -> Result<Vec<PackageRecord>, DbError> {
    if !dir.is_dir() {
        return Err(DbError::new(DbErrorCode::DbNotFound, dir.display().to_string()));
    }
    let read_err = |err: std::io::Error| {
        DbError::new(DbErrorCode::DbRead, format!("{}: {err}", dir.display()))
    };

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(read_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    entries.sort();

    let mut packages = Vec::with_capacity(entries.len());
    for entry in entries {
        let desc_path = entry.join("desc");
        let parsed = fs::read_to_string(&desc_path)
            .map_err(|err| err.to_string())
            .and_then(|text| DescRecord::parse(&text).map_err(|err| err.to_string()))
            .and_then(|desc| PackageRecord::from_desc(&desc, LOCAL_DB).map_err(|err| err.to_string()));
        match parsed {
            Ok(record) => packages.push(record),
            Err(err) => warn!("Skipping {}: {}", desc_path.display(), err),
        }
    }
    Ok(packages)
}

fn read_sync_db(path: &Path, repo: &str) -> Result<Vec<PackageRecord>, DbError> {
    let entries = read_archive_file(path)
        .map_err(|err| DbError::new(DbErrorCode::DbRead, format!("{}: {err}", path.display())))?;

    let mut packages = Vec::new();
    for entry in entries.iter().filter(|e| e.file_name() == "desc") {
        let parsed = DescRecord::parse(&entry.text())
            .and_then(|desc| PackageRecord::from_desc(&desc, repo));
        match parsed {
            Ok(record) => packages.push(record),
            Err(err) => warn!("Skipping {} in {}: {}", entry.path, path.display(), err),
        }
    }
    Ok(packages)
}
