//! CLI command implementations.

pub mod bulk;
pub mod context;
pub mod hook;
pub mod toggle;
