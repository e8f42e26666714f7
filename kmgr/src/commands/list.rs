//! List command implementation.

use crate::catalog::{CatalogSnapshot, Kernel};
use crate::classify::KernelCategory;
use crate::session::Session;
use anyhow::{Result, bail};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show installed kernels
    #[arg(long)]
    pub installed: bool,

    /// Only show installed kernels with a newer version available
    #[arg(long)]
    pub updates: bool,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct KernelEntry<'a> {
    name: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    installed_version: Option<&'a str>,
    category: KernelCategory,
    repository: &'a str,
    installed: bool,
    update_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<&'a str>,
}

impl<'a> KernelEntry<'a> {
    fn new(snapshot: &'a CatalogSnapshot, kernel: &'a Kernel) -> Self {
        Self {
            name: &kernel.name,
            version: snapshot.version(kernel),
            installed_version: snapshot.installed_version(kernel),
            category: kernel.category(),
            repository: &kernel.repository,
            installed: kernel.is_installed(),
            update_available: kernel.is_update_available(),
            headers: snapshot.headers(kernel).map(|h| h.name.as_str()),
        }
    }
}

pub fn run(args: ListArgs, session: &Session) -> Result<()> {
    if args.format != "table" && args.format != "json" {
        bail!("Unknown format '{}' (expected table or json)", args.format);
    }

    let (db, snapshot) = super::load_catalog(session)?;
    super::release(db);

    let entries: Vec<KernelEntry> = snapshot
        .kernels()
        .iter()
        .filter(|k| !args.installed || k.is_installed())
        .filter(|k| !args.updates || k.is_update_available())
        .map(|k| KernelEntry::new(&snapshot, k))
        .collect();

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No kernels found.");
        return Ok(());
    }

    println!(
        "{:<32} {:<20} {:<16} {:<12} STATUS",
        "NAME", "VERSION", "CATEGORY", "REPOSITORY"
    );
    println!("{}", "-".repeat(90));
    for entry in &entries {
        let status = match (entry.installed, entry.update_available) {
            (true, true) => format!(
                "{} {}",
                "installed".green(),
                format!("(update from {})", entry.installed_version.unwrap_or("?")).yellow()
            ),
            (true, false) => "installed".green().to_string(),
            (false, _) => String::new(),
        };
        println!(
            "{:<32} {:<20} {:<16} {:<12} {}",
            entry.name,
            entry.version,
            entry.category.label(),
            entry.repository,
            status
        );
    }

    let installed = entries.iter().filter(|e| e.installed).count();
    let updates = entries.iter().filter(|e| e.update_available).count();
    println!(
        "\n{} kernels ({} installed, {} with updates)",
        entries.len(),
        installed,
        updates
    );
    Ok(())
}
