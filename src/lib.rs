//! Media Renamer Library
//!
//! Renames and moves media files from their metadata, keeping the metadata
//! service's index in step with every move.

pub mod cli;
pub mod core;
pub mod error;
pub mod generators;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
