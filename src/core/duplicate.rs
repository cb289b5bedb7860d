//! Duplicate detection against the index.

use crate::core::planner::{PlannedRename, RenamePlanner};
use crate::models::template::Template;
use crate::services::graphql::{MetadataService, PathModifier};
use crate::Result;

/// Advances the duplicate suffix until the target path is free.
pub struct DuplicateResolver<'a> {
    service: &'a dyn MetadataService,
    planner: &'a RenamePlanner<'a>,
}

impl<'a> DuplicateResolver<'a> {
    pub fn new(service: &'a dyn MetadataService, planner: &'a RenamePlanner<'a>) -> Self {
        Self { service, planner }
    }

    /// Make `planned` point at a free path.
    ///
    /// Stops early when a suffixed name is the file's current path. Fails
    /// with `DuplicateExhausted` once the suffix list runs out, and with
    /// `Length` when a suffix pushes the path over `path.max_length`.
    pub fn resolve(&self, item_id: &str, template: &Template, planned: &mut PlannedRename) -> Result<()> {
        while self.collides(item_id, planned)? {
            tracing::debug!("Duplicate filename detected, increasing file index");
            planned.suffix_index += 1;
            planned.intent.final_filename =
                self.planner
                    .suffixed_filename(template, &planned.fields, planned.suffix_index)?;
            tracing::debug!("[NEW filename] {}", planned.intent.final_filename);
            self.planner.check_length(&planned.intent)?;
        }
        Ok(())
    }

    /// Whether the final path is taken by another item or file. Filename-only
    /// matches on other items are reported but don't count.
    fn collides(&self, item_id: &str, planned: &PlannedRename) -> Result<bool> {
        if planned.intent.is_noop() {
            return Ok(false);
        }
        let final_path = planned.intent.final_path();
        let final_path_str = final_path.to_string_lossy();

        let matches = self.service.find_by_path(&final_path_str, PathModifier::Equals)?;
        let others: Vec<_> = matches.items.iter().filter(|m| m.id != item_id).collect();
        if !others.is_empty() {
            tracing::error!("Duplicate path detected");
            for found in &others {
                tracing::warn!("Identical path: [{}]", found.id);
            }
            return Ok(true);
        }
        if final_path.exists() {
            tracing::error!("A file already exists at {}", final_path.display());
            return Ok(true);
        }

        let matches = self
            .service
            .find_by_path(&planned.intent.final_filename, PathModifier::Includes)?;
        for found in matches.items.iter().filter(|m| m.id != item_id) {
            tracing::warn!("Duplicate filename: [{}]", found.id);
        }
        Ok(false)
    }
}
