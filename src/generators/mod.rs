//! Filename and directory generators.

pub mod filename;
pub mod folder;
