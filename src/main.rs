//! Media Renamer CLI
//!
//! Renames and moves media files from their metadata.

use clap::Parser;
use media_renamer::cli::{
    args::{Cli, Commands},
    commands::{bulk, hook, toggle},
};
use media_renamer::models::config::{default_config_path, load_config};

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Hook { item_id } => {
            let config = load_config(Some(&config_path))?;
            hook::run_hook(&config, &item_id)?;
        }

        Commands::Bulk { limit, direction } => {
            let config = load_config(Some(&config_path))?;
            bulk::run_bulk(&config, limit, direction.map(Into::into))?;
        }

        Commands::EnableHook => {
            toggle::set_hook(&config_path, true)?;
        }

        Commands::DisableHook => {
            toggle::set_hook(&config_path, false)?;
        }

        Commands::ToggleDryRun => {
            toggle::toggle_dry_run(&config_path)?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("media_renamer=debug")
    } else {
        EnvFilter::new("media_renamer=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
