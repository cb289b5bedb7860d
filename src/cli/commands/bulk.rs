//! Bulk command implementation.

use crate::cli::commands::context::{connect, RunContext};
use crate::core::batch::BatchOrchestrator;
use crate::models::config::{Config, SortDirection};
use crate::services::lock::platform_inspector;
use crate::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Process a page of items ordered by update time.
pub fn run_bulk(config: &Config, limit: Option<u32>, direction: Option<SortDirection>) -> Result<()> {
    let direction = direction.unwrap_or(config.general.bulk_direction);
    if config.general.dry_run {
        println!("{}", "[DRY-RUN] Nothing will be moved".yellow());
    }

    let RunContext { client, mut index } = connect(config)?;
    let inspector = platform_inspector();
    let orchestrator = BatchOrchestrator::new(config, &client, inspector.as_ref())?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let summary = orchestrator.run_bulk(limit, direction, &mut index, |completed, total| {
        pb.set_length(total as u64);
        pb.set_position(completed as u64);
    })?;
    pb.finish_with_message("Done!");
    println!();

    println!("{}", "[Bulk Summary]".bold().green());
    println!("  {} {}", "Items:".bold(), summary.items);
    println!("  {} {}", "Renamed files:".bold(), summary.renamed);
    println!("  {} {}", "Unchanged files:".bold(), summary.unchanged);
    if summary.dry_run > 0 {
        println!("  {} {}", "Dry-run files:".bold(), summary.dry_run);
    }
    if summary.skipped_items > 0 {
        println!("  {} {}", "Skipped items:".bold(), summary.skipped_items);
    }
    if summary.failed_items > 0 {
        println!(
            "  {} {}",
            "Failed items:".bold().red(),
            summary.failed_items
        );
    }
    Ok(())
}
