//! Data models.

pub mod config;
pub mod fields;
pub mod record;
pub mod template;
pub mod transaction;
