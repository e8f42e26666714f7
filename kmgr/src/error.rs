//! Custom error types for kmgr.

use crate::db::DbError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where in the init/stage/prepare/commit cycle a transaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    Init,
    Stage,
    Prepare,
    Commit,
}

impl fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStage::Init => write!(f, "init"),
            TransactionStage::Stage => write!(f, "stage"),
            TransactionStage::Prepare => write!(f, "prepare"),
            TransactionStage::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Error, Debug)]
pub enum KmError {
    #[error("Failed to open package database at {path}: {source}")]
    DbOpen {
        path: PathBuf,
        #[source]
        source: DbError,
    },

    #[error("Transaction failed during {stage}: {source}")]
    Transaction {
        stage: TransactionStage,
        #[source]
        source: DbError,
    },

    /// The package database applied part of a commit before failing.
    #[error("Transaction partially committed ({}): {source}", applied_summary(installed, removed))]
    PartialCommit {
        installed: Vec<String>,
        removed: Vec<String>,
        #[source]
        source: DbError,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },

    #[error("Unknown kernel: '{name}'")]
    UnknownKernel { name: String },

    #[error("Build environment preparation failed: {}", failed.join(", "))]
    Preparation { failed: Vec<String> },

    #[error("Invalid configuration at {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn applied_summary(installed: &[String], removed: &[String]) -> String {
    let mut parts = Vec::new();
    if !installed.is_empty() {
        parts.push(format!("installed {}", installed.join(", ")));
    }
    if !removed.is_empty() {
        parts.push(format!("removed {}", removed.join(", ")));
    }
    if parts.is_empty() {
        "nothing queued was applied".to_string()
    } else {
        parts.join("; ")
    }
}

impl KmError {
    /// True for failures that left the system untouched, so the caller may
    /// simply retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KmError::Transaction { .. } | KmError::Cancelled { .. } | KmError::Preparation { .. }
        )
    }
}
