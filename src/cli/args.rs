//! Command line argument definitions.

use crate::models::config::SortDirection;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Media Renamer - Rename and move media files from their metadata
#[derive(Parser, Debug)]
#[command(name = "media-renamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rename the files of one item (update hook)
    Hook {
        /// Id of the updated item
        #[arg(value_name = "ITEM_ID")]
        item_id: String,
    },

    /// Rename the files of many items ordered by update time
    Bulk {
        /// Number of items to process (defaults to general.batch_size)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Ordering by update time (defaults to general.bulk_direction)
        #[arg(short, long, value_enum)]
        direction: Option<Direction>,
    },

    /// Enable the update hook
    EnableHook,

    /// Disable the update hook
    DisableHook,

    /// Toggle dry-run mode
    ToggleDryRun,
}

/// Bulk ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for SortDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => SortDirection::Asc,
            Direction::Desc => SortDirection::Desc,
        }
    }
}
