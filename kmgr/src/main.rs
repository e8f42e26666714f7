use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kmgr::commands;
use kmgr::config::KmConfig;
use kmgr::output::Output;
use kmgr::session::Session;
use kmgr::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing with RUST_LOG env filter
    // e.g., RUST_LOG=kmgr=debug
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions(args) = cli.command {
        return commands::completions::run(args);
    }

    let config = KmConfig::load()?;
    let session = Session::from_cli(&cli, config);

    // Long operations poll the token at safe points; a commit past prepare runs to completion.
    let cancel = session.cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        Output::warning("Cancelling after the current step (press Ctrl-C again to abort)");
        cancel.cancel();
    }) {
        tracing::warn!("Failed to install Ctrl-C handler: {}", err);
    }

    tracing::debug!(dry_run = session.dry_run, "Session created");

    match cli.command {
        Commands::List(args) => commands::list::run(args, &session),
        Commands::Install(args) => commands::transaction::install(args, &session),
        Commands::Remove(args) => commands::transaction::remove(args, &session),
        Commands::Apply(args) => commands::transaction::apply(args, &session),
        Commands::Prepare => commands::prepare::run(&session),
        Commands::Build(args) => commands::build::run(args, &session),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
