//! Running build and install commands in the terminal helper.
//!
//! The helper opens a terminal, optionally inside a privileged root shell,
//! runs the given shell command and waits for the user to press enter.

use crate::command_runner::{CommandOptions, CommandRunner, display_command};
use crate::config::KmConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Appended so the terminal stays open until the user has read the output.
const PAUSE: &str = "; read -p 'Press enter to exit'";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalHelper {
    pub helper: PathBuf,
    pub rootshell: PathBuf,
    pub escalation: String,
}

impl TerminalHelper {
    pub fn from_config(config: &KmConfig) -> Self {
        Self {
            helper: config.terminal_helper.clone(),
            rootshell: config.rootshell.clone(),
            escalation: config.escalation.clone(),
        }
    }

    /// Arguments passed to the helper binary.
    pub fn command_args(&self, cmd: &str, escalate: bool) -> Vec<String> {
        let mut args = Vec::with_capacity(3);
        if escalate {
            args.push("-s".to_string());
            args.push(
                format!("{} {}", self.escalation, self.rootshell.display())
                    .trim()
                    .to_string(),
            );
        }
        args.push(format!("{cmd}{PAUSE}"));
        args
    }

    /// Run `cmd` through the helper and return its exit code.
    pub fn run(&self, runner: &dyn CommandRunner, cmd: &str, escalate: bool) -> Result<i32> {
        let program = self.helper.to_string_lossy();
        let args = self.command_args(cmd, escalate);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::info!("{}", display_command(&program, &args));

        let status = runner
            .run_status(&program, &args, &CommandOptions::default())
            .with_context(|| format!("Failed to run terminal helper {}", self.helper.display()))?;
        // Killed by a signal: report like a shell would.
        Ok(status.code().unwrap_or(128))
    }
}

/// Shell command building the kernel recipe in `<checkout>/<recipe_dir>`.
pub fn build_kernel_command(checkout: &Path, recipe_dir: &str, build_command: &str) -> Result<String> {
    let dir = checkout.join(recipe_dir);
    let dir = dir.to_string_lossy();
    let quoted = shlex::try_quote(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to quote path '{}': {}", dir, e))?;
    Ok(format!("cd {quoted} && {build_command}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::testing::MockCommandRunner;

    fn helper() -> TerminalHelper {
        TerminalHelper::from_config(&KmConfig::default())
    }

    #[test]
    fn escalated_args_use_rootshell() {
        let args = helper().command_args("pacman -Syu", true);
        assert_eq!(
            args,
            vec![
                "-s",
                "pkexec /usr/lib/cachyos-kernel-manager/rootshell.sh",
                "pacman -Syu; read -p 'Press enter to exit'",
            ]
        );
    }

    #[test]
    fn unescalated_args_only_carry_command() {
        let args = helper().command_args("makepkg -si", false);
        assert_eq!(args, vec!["makepkg -si; read -p 'Press enter to exit'"]);
    }

    #[test]
    fn run_invokes_helper_and_returns_exit_code() {
        let runner = MockCommandRunner::new();
        let code = helper().run(&runner, "true", false).unwrap();
        assert_eq!(code, 0);

        let calls = runner.calls();
        assert_eq!(calls[0].program, "/usr/lib/cachyos-kernel-manager/terminal-helper");
        assert_eq!(calls[0].args, vec!["true; read -p 'Press enter to exit'"]);

        let failing =
            MockCommandRunner::new().fail_on("/usr/lib/cachyos-kernel-manager/terminal-helper", &[]);
        assert_eq!(helper().run(&failing, "false", true).unwrap(), 1);
    }

    #[test]
    fn missing_helper_is_an_error() {
        let runner =
            MockCommandRunner::new().missing_program("/usr/lib/cachyos-kernel-manager/terminal-helper");
        let err = helper().run(&runner, "true", false).unwrap_err();
        assert!(err.to_string().contains("terminal helper"));
    }

    #[test]
    fn build_command_quotes_directory() {
        let cmd = build_kernel_command(
            Path::new("/home/me/.cache/cachyos-km/pkgbuilds"),
            "linux-cachyos",
            "makepkg -sicf --cleanbuild --skipchecksums",
        )
        .unwrap();
        assert_eq!(
            cmd,
            "cd /home/me/.cache/cachyos-km/pkgbuilds/linux-cachyos && makepkg -sicf --cleanbuild --skipchecksums"
        );

        let cmd = build_kernel_command(Path::new("/tmp/my builds"), "linux-zen", "makepkg").unwrap();
        assert_eq!(cmd, "cd '/tmp/my builds/linux-zen' && makepkg");
    }
}
