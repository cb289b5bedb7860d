//! Core rename engine.

pub mod batch;
pub mod duplicate;
pub mod executor;
pub mod extractor;
pub mod indexer;
pub mod planner;
pub mod resolver;
pub mod selector;
