//! Prepare command implementation.
//!
//! Brings the build-recipe checkout up to date and prints one line per step.

use crate::build_env::{BuildEnvironmentPreparer, PrepareReport, StepStatus};
use crate::output::Output;
use crate::session::Session;
use crate::worker::Worker;
use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;

pub(crate) fn preparer(session: &Session) -> BuildEnvironmentPreparer {
    let config = &session.config;
    BuildEnvironmentPreparer::new(
        config.cache_dir(),
        config.recipe_url.as_str(),
        config.recipe_branch.as_str(),
        config.checkout_name.as_str(),
        session.runner(),
    )
}

/// Run the preparer on a worker thread and print its report.
pub(crate) fn prepare_checkout(session: &Session) -> Result<PathBuf> {
    let preparer = preparer(session);

    if session.dry_run {
        let checkout = preparer.checkout_dir();
        Output::dry_run(format!(
            "Would refresh {} from {} ({})",
            checkout.display(),
            session.config.recipe_url,
            session.config.recipe_branch
        ));
        return Ok(checkout);
    }

    Output::info(format!("Preparing {}", preparer.checkout_dir().display()));
    let cancel = session.cancel.clone();
    let report = Worker::spawn("kmgr-prepare", move || preparer.prepare(&cancel))
        .context("Failed to start preparation worker")?
        .wait()
        .ok_or_else(|| anyhow!("Preparation worker exited without a result"))?;

    print_report(&report);
    Ok(report.into_result()?)
}

fn print_report(report: &PrepareReport) {
    for outcome in &report.steps {
        match &outcome.status {
            StepStatus::Succeeded => Output::step(outcome.step.to_string()),
            StepStatus::Failed(reason) => Output::step_failed(outcome.step.to_string(), reason),
            StepStatus::Skipped => Output::step(format!("{} (skipped)", outcome.step)),
        }
    }
}

pub fn run(session: &Session) -> Result<()> {
    let checkout = prepare_checkout(session)?;
    if !session.dry_run {
        Output::success(format!("Build recipes ready in {}", checkout.display()));
    }
    Ok(())
}
