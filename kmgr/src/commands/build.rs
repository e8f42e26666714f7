//! Build command implementation.
//!
//! Refreshes the recipe checkout, applies the build environment through the
//! process-wide [`EnvironmentScope`], then runs the build in the terminal
//! helper.

use crate::env_scope::{AssignmentSet, EnvironmentScope};
use crate::error::KmError;
use crate::output::Output;
use crate::session::Session;
use crate::terminal::{TerminalHelper, build_kernel_command};
use anyhow::{Context, Result, bail};
use clap::Args;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Kernel to build (recipe directory is the package base)
    pub kernel: String,

    /// File of NAME=VALUE lines to export for this build (default: build_env from config)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Run the build in a root shell
    #[arg(long)]
    pub escalate: bool,
}

pub fn run(args: BuildArgs, session: &Session) -> Result<()> {
    let (db, snapshot) = super::load_catalog(session)?;
    super::release(db);
    let kernel = snapshot.find(&args.kernel).ok_or_else(|| KmError::UnknownKernel {
        name: args.kernel.clone(),
    })?;
    let recipe_dir = if kernel.raw.is_empty() {
        kernel.name.clone()
    } else {
        kernel.raw.clone()
    };

    let env_text = match &args.env_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => session.config.build_env.clone(),
    };
    let assignments = AssignmentSet::parse(&env_text);

    let checkout = super::prepare::prepare_checkout(session)?;
    let command = build_kernel_command(&checkout, &recipe_dir, &session.config.build_command)?;

    if session.dry_run {
        for (name, value) in &assignments.assignments {
            Output::dry_run(format!("Would export {name}={value}"));
        }
        Output::dry_run(format!("Would run: {command}"));
        return Ok(());
    }

    let report = EnvironmentScope::global().apply(&assignments);
    for malformed in &report.malformed {
        Output::warning(format!(
            "Ignoring line {} of the build environment: '{}'",
            malformed.line, malformed.text
        ));
    }
    for (name, reason) in &report.failed {
        Output::warning(format!("Could not export '{name}': {reason}"));
    }
    if !report.set.is_empty() {
        Output::info(format!("Exported {}", report.set.join(", ")));
    }

    Output::running(&command);
    let helper = TerminalHelper::from_config(&session.config);
    let code = helper.run(session.runner().as_ref(), &command, args.escalate)?;
    if code != 0 {
        bail!("Build of {} exited with status {}", kernel.name, code);
    }
    Output::success(format!("Built {}", kernel.name));
    Ok(())
}
