//! Template selection.
//!
//! Filename templates: tag > studio chain > default.
//! Path templates: tag > studio chain > path prefix > default.
//! Unorganized items go to `path.non_organized` when it is set.

use crate::models::config::Config;
use crate::models::record::{MetadataRecord, StudioRef};
use crate::models::template::{Template, TemplateOption};
use crate::Result;
use std::collections::HashMap;
use std::path::Path;

/// Picks the templates that apply to a file.
pub struct TemplateSelector<'a> {
    config: &'a Config,
}

impl<'a> TemplateSelector<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Whether the item is left alone because it isn't organized.
    pub fn skips(&self, record: &MetadataRecord) -> bool {
        self.config.general.only_organized
            && !record.organized
            && self.config.path.non_organized.is_none()
    }

    /// Select the templates for one file of `record`.
    ///
    /// `studio_chain` is leaf first.
    pub fn select(
        &self,
        record: &MetadataRecord,
        file_path: &Path,
        studio_chain: &[StudioRef],
    ) -> Result<Template> {
        let tags = record.tag_names();
        let mut template = Template {
            filename_pattern: self.filename_pattern(&tags, studio_chain),
            path_pattern: self.path_pattern(record, &tags, file_path, studio_chain),
            ..Template::default()
        };
        self.apply_tag_options(record, &mut template);

        if template.is_empty() {
            return Err(crate::Error::Validation(record.id.clone()));
        }
        tracing::debug!("[{}] Template: {:?}", record.id, template);
        Ok(template)
    }

    fn filename_pattern(&self, tags: &[&str], studio_chain: &[StudioRef]) -> Option<String> {
        let filename = &self.config.filename;
        if let Some(found) = by_tag(&filename.tag_templates, tags) {
            return Some(found);
        }
        if let Some(found) = by_studio(&filename.studio_templates, studio_chain) {
            return Some(found);
        }
        if filename.use_default_template && !filename.default_template.is_empty() {
            tracing::debug!("[FILENAME] Using default template");
            return Some(filename.default_template.clone());
        }
        None
    }

    fn path_pattern(
        &self,
        record: &MetadataRecord,
        tags: &[&str],
        file_path: &Path,
        studio_chain: &[StudioRef],
    ) -> Option<String> {
        let path = &self.config.path;
        if !record.organized {
            if let Some(ref destination) = path.non_organized {
                return Some(destination.clone());
            }
        }
        if let Some(found) = by_tag(&path.tag_templates, tags) {
            return Some(found);
        }
        if let Some(found) = by_studio(&path.studio_templates, studio_chain) {
            return Some(found);
        }
        let current = file_path.to_string_lossy();
        if let Some(rule) = path
            .path_templates
            .iter()
            .find(|rule| current.starts_with(rule.prefix.as_str()))
        {
            return Some(rule.destination.clone());
        }
        if path.use_default_template && !path.default_template.is_empty() {
            tracing::debug!("[PATH] Using default template");
            return Some(path.default_template.clone());
        }
        None
    }

    fn apply_tag_options(&self, record: &MetadataRecord, template: &mut Template) {
        for tag in &record.tags {
            let Some(options) = self.config.path.tag_options.get(&tag.name) else {
                continue;
            };
            for raw in options {
                match TemplateOption::parse(raw) {
                    Some(option) => {
                        template.options.insert(option);
                        if option == TemplateOption::CleanTag {
                            template.clean_tag_ids.push(tag.id.clone());
                        }
                    }
                    None => tracing::warn!("Unknown tag option '{}' on tag '{}'", raw, tag.name),
                }
            }
        }
    }
}

fn by_tag(rules: &[crate::models::config::TagTemplate], tags: &[&str]) -> Option<String> {
    rules
        .iter()
        .find(|rule| tags.contains(&rule.tag.as_str()))
        .map(|rule| rule.template.clone())
}

fn by_studio(templates: &HashMap<String, String>, studio_chain: &[StudioRef]) -> Option<String> {
    studio_chain
        .iter()
        .find_map(|studio| templates.get(&studio.name))
        .cloned()
}
