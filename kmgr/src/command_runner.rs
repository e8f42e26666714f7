//! Abstraction over external command execution for testability.
//!
//! Every subprocess kmgr starts (git for the recipe checkout, pacman for
//! transactions, the terminal helper for builds) goes through the
//! [`CommandRunner`] trait so that unit tests can substitute
//! [`testing::MockCommandRunner`] and never spawn anything.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Output};

/// Trait for abstracting external command execution.
///
/// Stored as `Arc<dyn CommandRunner>` by the components that need it.
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its full output (stdout + stderr + exit status).
    fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output>;

    /// Run a command and return only its exit status (inherits stdio).
    fn run_status(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<ExitStatus>;
}

/// Options for command execution.
#[derive(Debug, Default, Clone)]
pub struct CommandOptions {
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
    /// Additional environment variables.
    pub env: Vec<(String, String)>,
}

impl CommandOptions {
    /// Create options with a working directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Default::default()
        }
    }
}

/// Render a command line for logs and dry-run output.
pub fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Production implementation that delegates to [`std::process::Command`].
pub struct RealCommandRunner;

impl RealCommandRunner {
    fn command(program: &str, args: &[&str], options: &CommandOptions) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &options.env {
            cmd.env(k, v);
        }
        cmd
    }
}

impl CommandRunner for RealCommandRunner {
    fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output> {
        tracing::debug!(command = %display_command(program, args), "running");
        Self::command(program, args, options)
            .output()
            .with_context(|| format!("Failed to run '{program}'"))
    }

    fn run_status(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<ExitStatus> {
        tracing::debug!(command = %display_command(program, args), "running");
        Self::command(program, args, options)
            .status()
            .with_context(|| format!("Failed to run '{program}'"))
    }
}

#[cfg(test)]
#[allow(dead_code)]
pub mod testing {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::Mutex;

    /// A command invocation recorded by [`MockCommandRunner`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedCall {
        pub program: String,
        pub args: Vec<String>,
        pub cwd: Option<PathBuf>,
    }

    impl RecordedCall {
        pub fn command_line(&self) -> String {
            let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
            display_command(&self.program, &args)
        }
    }

    /// Mock runner that records calls and exits 0 unless told otherwise.
    #[derive(Default)]
    pub struct MockCommandRunner {
        calls: Mutex<Vec<RecordedCall>>,
        failures: Vec<(String, Vec<String>)>,
        spawn_errors: Vec<String>,
    }

    impl MockCommandRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Exit 1 for calls of `program` whose arguments start with `args_prefix`.
        pub fn fail_on(mut self, program: &str, args_prefix: &[&str]) -> Self {
            self.failures.push((
                program.to_string(),
                args_prefix.iter().map(|a| a.to_string()).collect(),
            ));
            self
        }

        /// Fail to spawn `program` at all.
        pub fn missing_program(mut self, program: &str) -> Self {
            self.spawn_errors.push(program.to_string());
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn command_lines(&self) -> Vec<String> {
            self.calls().iter().map(RecordedCall::command_line).collect()
        }

        fn record(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<ExitStatus> {
            self.calls.lock().unwrap().push(RecordedCall {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                cwd: options.cwd.clone(),
            });

            if self.spawn_errors.iter().any(|p| p == program) {
                anyhow::bail!("Failed to run '{program}'");
            }

            let failed = self.failures.iter().any(|(p, prefix)| {
                p == program
                    && prefix.len() <= args.len()
                    && prefix.iter().zip(args).all(|(want, got)| want == got)
            });
            Ok(ExitStatus::from_raw(if failed { 1 << 8 } else { 0 }))
        }
    }

    impl CommandRunner for MockCommandRunner {
        fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output> {
            let status = self.record(program, args, options)?;
            Ok(Output {
                status,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }

        fn run_status(
            &self,
            program: &str,
            args: &[&str],
            options: &CommandOptions,
        ) -> Result<ExitStatus> {
            self.record(program, args, options)
        }
    }
}
