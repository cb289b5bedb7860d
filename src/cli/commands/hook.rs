//! Hook command implementation.
//!
//! Renames the files of the item that was just updated.

use crate::cli::commands::context::{connect, RunContext};
use crate::core::batch::BatchOrchestrator;
use crate::models::config::Config;
use crate::services::lock::platform_inspector;
use crate::Result;
use colored::Colorize;

/// Process one item.
pub fn run_hook(config: &Config, item_id: &str) -> Result<()> {
    if !config.general.enable_hook {
        tracing::info!("Hook disabled, nothing to do");
        return Ok(());
    }

    let RunContext { client, mut index } = connect(config)?;
    let inspector = platform_inspector();
    let orchestrator = BatchOrchestrator::new(config, &client, inspector.as_ref())?;

    let report = orchestrator.run_hook(item_id, &mut index)?;
    if report.skipped {
        println!("{} Item {} skipped (not organized)", "[SKIP]".yellow(), item_id);
    } else if report.failed > 0 {
        println!(
            "{} Item {}: {} file(s) failed, {} renamed",
            "[FAILED]".bold().red(),
            item_id,
            report.failed,
            report.renamed
        );
    } else {
        println!(
            "{} Item {}: {} renamed, {} unchanged, {} dry-run",
            "[OK]".green(),
            item_id,
            report.renamed,
            report.unchanged,
            report.dry_run
        );
    }
    Ok(())
}
