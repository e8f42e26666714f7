//! CLI command implementations.

pub mod build;
pub mod completions;
pub mod list;
pub mod prepare;
pub mod transaction;

use crate::catalog::{CatalogSnapshot, build_catalog};
use crate::db::PackageDatabase;
use crate::error::KmError;
use crate::output::Output;
use crate::session::Session;
use crate::worker::Worker;
use anyhow::{Context, Result, anyhow};

/// Open the package database and build a catalog on a worker thread.
pub(crate) fn load_catalog(
    session: &Session,
) -> Result<(Box<dyn PackageDatabase>, CatalogSnapshot)> {
    let db = session.open_database()?;
    let naming = session.config.naming.clone();

    let spinner = Output::spinner("Reading package databases...");
    let job = Worker::spawn("kmgr-catalog", move || {
        let snapshot = build_catalog(db.as_ref(), &naming);
        (db, snapshot)
    })
    .context("Failed to start catalog worker")?;
    let loaded = job.wait();
    spinner.finish_clear();

    loaded.ok_or_else(|| anyhow!("Catalog worker exited without a result"))
}

/// Fail on the first name that is not a kernel in the catalog.
pub(crate) fn require_known(snapshot: &CatalogSnapshot, names: &[String]) -> Result<(), KmError> {
    match names.iter().find(|name| snapshot.find(name).is_none()) {
        Some(name) => Err(KmError::UnknownKernel { name: name.clone() }),
        None => Ok(()),
    }
}

/// Release the database handle; a failure here only warrants a warning.
pub(crate) fn release(db: Box<dyn PackageDatabase>) {
    if let Err(err) = db.release() {
        tracing::warn!("Failed to release package database: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::KernelNaming;
    use crate::db::MemoryDatabase;

    #[test]
    fn require_known_names_the_unknown_kernel() {
        let db = MemoryDatabase::new().with_repo("core", &[("linux", "6.9.2.arch1-1")]);
        let snapshot = build_catalog(&db, &KernelNaming::default());

        assert!(require_known(&snapshot, &["linux".to_string()]).is_ok());
        let err = require_known(&snapshot, &["linux".to_string(), "linux-foo".to_string()])
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown kernel: 'linux-foo'");
    }
}
