//! Build-recipe checkout preparation.
//!
//! [`BuildEnvironmentPreparer::prepare`] makes sure the recipe repository is
//! cloned under the cache root, on the expected branch, clean and up to date.
//! Every step runs even when an earlier one failed, so the tree ends up in the
//! most usable state possible; the per-step outcomes are returned in a
//! [`PrepareReport`].
//!
//! A checkout directory without `.git` is a leftover of an interrupted clone
//! and is deleted and cloned again.

use crate::command_runner::{CommandOptions, CommandRunner, display_command};
use crate::error::KmError;
use crate::worker::CancelToken;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareStep {
    CreateCacheRoot,
    RemoveCorruptCheckout,
    Clone,
    Checkout,
    Clean,
    Pull,
}

impl fmt::Display for PrepareStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PrepareStep::CreateCacheRoot => "create cache root",
            PrepareStep::RemoveCorruptCheckout => "remove corrupt checkout",
            PrepareStep::Clone => "clone",
            PrepareStep::Checkout => "checkout",
            PrepareStep::Clean => "clean",
            PrepareStep::Pull => "pull",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed(String),
    /// Not attempted because the preparation was cancelled.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: PrepareStep,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    pub checkout: PathBuf,
    /// Steps that applied to this run, in execution order.
    pub steps: Vec<StepOutcome>,
}

impl PrepareReport {
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Succeeded)
    }

    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed(_)))
            .collect()
    }

    pub fn was_cancelled(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Skipped)
    }

    pub fn status_of(&self, step: PrepareStep) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.status)
    }

    /// The checkout path when every step succeeded.
    pub fn into_result(self) -> Result<PathBuf, KmError> {
        let failed: Vec<String> = self
            .failures()
            .iter()
            .map(|outcome| match &outcome.status {
                StepStatus::Failed(reason) => format!("{} ({})", outcome.step, reason),
                _ => outcome.step.to_string(),
            })
            .collect();
        if !failed.is_empty() {
            return Err(KmError::Preparation { failed });
        }
        if self.was_cancelled() {
            return Err(KmError::Cancelled {
                operation: "preparation",
            });
        }
        Ok(self.checkout)
    }
}

pub struct BuildEnvironmentPreparer {
    cache_dir: PathBuf,
    recipe_url: String,
    branch: String,
    checkout_name: String,
    runner: Arc<dyn CommandRunner>,
}

impl BuildEnvironmentPreparer {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        recipe_url: impl Into<String>,
        branch: impl Into<String>,
        checkout_name: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            recipe_url: recipe_url.into(),
            branch: branch.into(),
            checkout_name: checkout_name.into(),
            runner,
        }
    }

    pub fn checkout_dir(&self) -> PathBuf {
        self.cache_dir.join(&self.checkout_name)
    }

    pub fn prepare(&self, cancel: &CancelToken) -> PrepareReport {
        let checkout = self.checkout_dir();
        let mut steps = Vec::new();
        let mut record = |step: PrepareStep, status: StepStatus| {
            if let StepStatus::Failed(reason) = &status {
                warn!("Preparation step '{}' failed: {}", step, reason);
            }
            steps.push(StepOutcome { step, status });
        };

        record(
            PrepareStep::CreateCacheRoot,
            fs_status(fs::create_dir_all(&self.cache_dir)),
        );

        if checkout.exists() && !checkout.join(".git").exists() {
            info!(
                "Removing {} (no version control metadata)",
                checkout.display()
            );
            let status = if checkout.is_dir() {
                fs::remove_dir_all(&checkout)
            } else {
                fs::remove_file(&checkout)
            };
            record(PrepareStep::RemoveCorruptCheckout, fs_status(status));
        }

        let mut plan: Vec<(PrepareStep, Vec<&str>, &Path)> = Vec::new();
        if !checkout.exists() {
            plan.push((
                PrepareStep::Clone,
                vec!["clone", self.recipe_url.as_str(), self.checkout_name.as_str()],
                self.cache_dir.as_path(),
            ));
        }
        plan.push((
            PrepareStep::Checkout,
            vec!["checkout", "--force", self.branch.as_str()],
            checkout.as_path(),
        ));
        plan.push((PrepareStep::Clean, vec!["clean", "-fd"], checkout.as_path()));
        plan.push((PrepareStep::Pull, vec!["pull"], checkout.as_path()));

        for (step, args, cwd) in plan {
            if cancel.is_cancelled() {
                debug!("Preparation cancelled before '{}'", step);
                record(step, StepStatus::Skipped);
                continue;
            }
            record(step, self.git(&args, cwd));
        }

        let report = PrepareReport { checkout, steps };
        if !report.failures().is_empty() {
            warn!(
                "Build environment preparation finished with {} failed step(s)",
                report.failures().len()
            );
        }
        report
    }

    fn git(&self, args: &[&str], cwd: &Path) -> StepStatus {
        let command = display_command("git", args);
        debug!(cwd = %cwd.display(), "{}", command);
        match self
            .runner
            .run_status("git", args, &CommandOptions::with_cwd(cwd))
        {
            Ok(status) if status.success() => StepStatus::Succeeded,
            Ok(status) => StepStatus::Failed(match status.code() {
                Some(code) => format!("'{command}' exited with {code}"),
                None => format!("'{command}' was terminated by a signal"),
            }),
            Err(err) => StepStatus::Failed(format!("{err:#}")),
        }
    }
}

fn fs_status(result: std::io::Result<()>) -> StepStatus {
    match result {
        Ok(()) => StepStatus::Succeeded,
        Err(err) => StepStatus::Failed(err.to_string()),
    }
}
