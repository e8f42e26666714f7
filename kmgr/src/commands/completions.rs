//! Shell completion generation.
//!
//! Completion scripts cover every kmgr subcommand, so kernel names passed to
//! `install`, `remove` and `build` are completed as plain arguments.

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Generator;
use clap_complete_nushell::Nushell;
use std::io::{self, Write};

use crate::cli::Cli;

/// Shells kmgr can generate completion scripts for.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// Nushell
    Nushell,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

fn write_with<G: Generator>(generator: G, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(generator, &mut cmd, name, out);
}

/// Write the completion script for `shell` to `out`.
pub fn generate(shell: Shell, out: &mut dyn Write) {
    match shell {
        Shell::Bash => write_with(clap_complete::Shell::Bash, out),
        Shell::Zsh => write_with(clap_complete::Shell::Zsh, out),
        Shell::Fish => write_with(clap_complete::Shell::Fish, out),
        Shell::Nushell => write_with(Nushell, out),
    }
}

/// Print the completion script to stdout.
pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut stdout = io::stdout().lock();
    generate(args.shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: Shell) -> String {
        let mut out = Vec::new();
        generate(shell, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scripts_name_the_kernel_subcommands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::Nushell] {
            let script = script(shell);
            assert!(script.contains("kmgr"), "{shell:?} script lacks program name");
            for subcommand in ["install", "remove", "apply", "build"] {
                assert!(script.contains(subcommand), "{shell:?} script lacks {subcommand}");
            }
        }
    }
}
