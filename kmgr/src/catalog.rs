//! Kernel catalog.
//!
//! [`build_catalog`] walks a [`PackageDatabase`] and produces a
//! [`CatalogSnapshot`]: every kernel variant offered by a repository or
//! installed locally, paired with its headers and out-of-tree module packages.
//!
//! The snapshot owns copies of every package record it refers to. [`Kernel`]
//! entries hold [`RecordId`] indices into that arena, so a snapshot stays
//! valid after the database handle is released. A snapshot is never refreshed
//! in place; build a new one after the database changes.

use crate::classify::{KernelCategory, classify};
use crate::db::{LOCAL_DB, PackageDatabase, PackageRecord};
use crate::vercmp::is_newer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Naming convention of kernel packages and their companions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KernelNaming {
    /// Kernel packages are named `prefix` or `prefix-*`.
    pub prefix: String,
    pub headers_suffix: String,
    pub zfs_suffix: String,
    pub nvidia_suffix: String,
    /// Packages sharing the prefix that are not kernels.
    pub excluded_prefixes: Vec<String>,
    /// Companion packages (headers, docs, modules).
    pub excluded_suffixes: Vec<String>,
}

impl Default for KernelNaming {
    fn default() -> Self {
        Self {
            prefix: "linux".to_string(),
            headers_suffix: "-headers".to_string(),
            zfs_suffix: "-zfs".to_string(),
            nvidia_suffix: "-nvidia".to_string(),
            excluded_prefixes: ["linux-api-headers", "linux-docs", "linux-firmware", "linux-tools"]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_suffixes: ["-headers", "-docs", "-zfs", "-nvidia", "-nvidia-open"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl KernelNaming {
    /// Whether `name` is a kernel package rather than a companion or unrelated package.
    pub fn is_kernel(&self, name: &str) -> bool {
        let matches_prefix = name == self.prefix
            || name
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('-') && rest.len() > 1);
        matches_prefix
            && !self
                .excluded_prefixes
                .iter()
                .any(|p| name == p || name.starts_with(&format!("{p}-")))
            && !self.excluded_suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }

    pub fn headers_name(&self, kernel: &str) -> String {
        format!("{kernel}{}", self.headers_suffix)
    }

    pub fn zfs_name(&self, kernel: &str) -> String {
        format!("{kernel}{}", self.zfs_suffix)
    }

    pub fn nvidia_name(&self, kernel: &str) -> String {
        format!("{kernel}{}", self.nvidia_suffix)
    }

    /// Headers, zfs and nvidia package names of `kernel`, in that order.
    pub fn companions(&self, kernel: &str) -> [String; 3] {
        [
            self.headers_name(kernel),
            self.zfs_name(kernel),
            self.nvidia_name(kernel),
        ]
    }
}

/// Index of a package record inside a [`CatalogSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(usize);

/// One installable kernel variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    pub name: String,
    /// First repository in search order offering the kernel, or `local`.
    pub repository: String,
    /// Package base; names the recipe directory used for source builds. May be empty.
    pub raw: String,
    /// Database the installed copy came from; empty when not installed.
    pub installed_db: String,
    update_available: bool,
    pkg: RecordId,
    headers: Option<RecordId>,
    zfs_module: Option<RecordId>,
    nvidia_module: Option<RecordId>,
    installed: Option<RecordId>,
}

impl Kernel {
    pub fn category(&self) -> KernelCategory {
        classify(&self.name)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    /// Computed once when the catalog was built.
    pub fn is_update_available(&self) -> bool {
        self.update_available
    }

    pub fn has_headers(&self) -> bool {
        self.headers.is_some()
    }
}

/// Kernels plus the package records they index into.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    records: Vec<PackageRecord>,
    kernels: Vec<Kernel>,
}

impl CatalogSnapshot {
    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Kernel> {
        self.kernels.iter().find(|k| k.name == name)
    }

    pub fn record(&self, id: RecordId) -> &PackageRecord {
        &self.records[id.0]
    }

    /// The kernel's own package (repository copy when one exists).
    pub fn package(&self, kernel: &Kernel) -> &PackageRecord {
        self.record(kernel.pkg)
    }

    pub fn version<'a>(&'a self, kernel: &Kernel) -> &'a str {
        &self.package(kernel).version
    }

    pub fn installed_version<'a>(&'a self, kernel: &Kernel) -> Option<&'a str> {
        kernel.installed.map(|id| self.record(id).version.as_str())
    }

    pub fn headers(&self, kernel: &Kernel) -> Option<&PackageRecord> {
        kernel.headers.map(|id| self.record(id))
    }

    pub fn zfs_module(&self, kernel: &Kernel) -> Option<&PackageRecord> {
        kernel.zfs_module.map(|id| self.record(id))
    }

    pub fn nvidia_module(&self, kernel: &Kernel) -> Option<&PackageRecord> {
        kernel.nvidia_module.map(|id| self.record(id))
    }

    fn intern(&mut self, record: &PackageRecord) -> RecordId {
        self.records.push(record.clone());
        RecordId(self.records.len() - 1)
    }
}

/// Build a fresh catalog from the current database state.
pub fn build_catalog(db: &dyn PackageDatabase, naming: &KernelNaming) -> CatalogSnapshot {
    let repos = db.repositories();

    // First repository in search order wins; keep database order otherwise.
    let mut candidates: Vec<(&str, &PackageRecord)> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for &repo in &repos {
        for pkg in db.sync_packages(repo) {
            if naming.is_kernel(&pkg.name) && seen.insert(pkg.name.as_str()) {
                candidates.push((repo, pkg));
            }
        }
    }
    for pkg in db.installed_packages() {
        if naming.is_kernel(&pkg.name) && seen.insert(pkg.name.as_str()) {
            candidates.push((LOCAL_DB, pkg));
        }
    }

    let mut snapshot = CatalogSnapshot {
        records: Vec::with_capacity(candidates.len() * 2),
        kernels: Vec::with_capacity(candidates.len()),
    };

    for (repo, pkg) in candidates {
        let companion = |name: String| lookup_companion(db, &repos, repo, &name);
        let [headers_name, zfs_name, nvidia_name] = naming.companions(&pkg.name);
        let headers = companion(headers_name);
        let zfs = companion(zfs_name);
        let nvidia = companion(nvidia_name);
        let installed = db.installed_package(&pkg.name);

        let update_available = installed.is_some_and(|local| {
            highest_sync_version(db, &repos, &pkg.name)
                .is_some_and(|remote| is_newer(remote, &local.version))
        });

        let pkg_id = snapshot.intern(pkg);
        let kernel = Kernel {
            name: pkg.name.clone(),
            repository: repo.to_string(),
            raw: pkg.base.clone().unwrap_or_default(),
            installed_db: installed
                .map(|_| db.local_db_name().to_string())
                .unwrap_or_default(),
            update_available,
            pkg: pkg_id,
            headers: headers.map(|r| snapshot.intern(r)),
            zfs_module: zfs.map(|r| snapshot.intern(r)),
            nvidia_module: nvidia.map(|r| snapshot.intern(r)),
            installed: installed.map(|r| snapshot.intern(r)),
        };
        tracing::trace!(
            kernel = %kernel.name,
            repo = %kernel.repository,
            installed = kernel.is_installed(),
            update = update_available,
            "catalogued"
        );
        snapshot.kernels.push(kernel);
    }

    tracing::debug!(kernels = snapshot.kernels.len(), "Built kernel catalog");
    snapshot
}

/// The kernel's own repository first, then the others in order, then local.
fn lookup_companion<'a>(
    db: &'a dyn PackageDatabase,
    repos: &[&str],
    home: &str,
    name: &str,
) -> Option<&'a PackageRecord> {
    let home_repo = (home != LOCAL_DB).then_some(home);
    home_repo
        .into_iter()
        .chain(repos.iter().copied().filter(|r| *r != home))
        .find_map(|repo| db.sync_package(repo, name))
        .or_else(|| db.installed_package(name))
}

fn highest_sync_version<'a>(
    db: &'a dyn PackageDatabase,
    repos: &[&str],
    name: &str,
) -> Option<&'a str> {
    repos
        .iter()
        .filter_map(|repo| db.sync_package(repo, name))
        .map(|p| p.version.as_str())
        .reduce(|best, v| if is_newer(v, best) { v } else { best })
}
