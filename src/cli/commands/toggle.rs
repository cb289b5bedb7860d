//! Configuration toggles.

use crate::models::config::set_config_flag;
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Turn the update hook on or off.
pub fn set_hook(config_path: &Path, enabled: bool) -> Result<()> {
    set_config_flag(config_path, "general.enable_hook", Some(enabled))?;
    let state = if enabled { "enabled".green() } else { "disabled".red() };
    println!("Hook {}", state);
    Ok(())
}

/// Flip dry-run mode.
pub fn toggle_dry_run(config_path: &Path) -> Result<()> {
    let enabled = set_config_flag(config_path, "general.dry_run", None)?;
    let state = if enabled { "on".yellow() } else { "off".green() };
    println!("Dry-run {}", state);
    Ok(())
}
