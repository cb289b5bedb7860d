//! Rename planning.
//!
//! Turns a template and a field map into a [`RenameIntent`]. When the
//! resulting path is longer than `path.max_length`, the fields listed in
//! `path.order_field` are dropped one at a time and the path recomputed.

use crate::core::resolver::TemplateResolver;
use crate::generators::filename::FilenameGenerator;
use crate::generators::folder::PathBuilder;
use crate::models::config::Config;
use crate::models::fields::{Field, FieldMap};
use crate::models::template::{RenameIntent, Template};
use crate::utils::fs::path_length;
use crate::Result;
use std::path::{Path, PathBuf};

/// A planned rename together with what produced it.
#[derive(Debug, Clone)]
pub struct PlannedRename {
    pub intent: RenameIntent,
    /// Fields left after length reduction; reused when a suffix is added.
    pub fields: FieldMap,
    /// Position in the duplicate suffix list.
    pub suffix_index: usize,
}

/// Computes rename intents.
pub struct RenamePlanner<'a> {
    config: &'a Config,
    resolver: TemplateResolver<'a>,
    drop_order: Vec<Field>,
}

impl<'a> RenamePlanner<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        let mut drop_order = Vec::with_capacity(config.path.order_field.len());
        for name in &config.path.order_field {
            match Field::from_token(name) {
                Some(field) => drop_order.push(field),
                None => tracing::warn!("Unknown field '{}' in order_field, ignored", name),
            }
        }
        Ok(Self {
            config,
            resolver: TemplateResolver::new(config)?,
            drop_order,
        })
    }

    /// Plan the rename of the file at `file_index` of an item.
    pub fn plan(
        &self,
        template: &Template,
        mut fields: FieldMap,
        file_path: &Path,
        file_index: usize,
    ) -> Result<PlannedRename> {
        let limit = self.config.path.max_length;
        let mut candidate = None;

        for dropped in std::iter::once(None).chain(self.drop_order.iter().copied().map(Some)) {
            if let Some(field) = dropped {
                if fields.remove(field).is_none() {
                    continue;
                }
                tracing::warn!("Removed {} to reduce the length path", field);
            }

            let intent = RenameIntent {
                current_path: file_path.to_path_buf(),
                final_directory: self.directory(template, &fields),
                final_filename: self.initial_filename(template, &fields, file_index)?,
                file_index,
            };
            let fits = self.config.path.ignore_length || path_length(&intent.final_path()) <= limit;
            candidate = Some(intent);
            if fits {
                break;
            }
        }

        let intent = candidate.ok_or_else(|| crate::Error::other("nothing to plan"))?;
        self.check_length(&intent)?;

        Ok(PlannedRename {
            intent,
            fields,
            suffix_index: file_index,
        })
    }

    /// Fail with `Length` when the final path exceeds `path.max_length`.
    pub fn check_length(&self, intent: &RenameIntent) -> Result<()> {
        let limit = self.config.path.max_length;
        let length = path_length(&intent.final_path());
        if self.config.path.ignore_length || length <= limit {
            return Ok(());
        }
        tracing::error!(
            "The path is too long ({} > {}). You can look at 'order_field'/'ignore_length' in config.",
            length,
            limit
        );
        Err(crate::Error::Length {
            path: intent.final_path().to_string_lossy().to_string(),
            length,
            limit,
        })
    }

    /// Filename for a given position in the suffix list.
    ///
    /// Without a filename template the current name gets the suffix
    /// inserted before its extension.
    pub fn suffixed_filename(
        &self,
        template: &Template,
        fields: &FieldMap,
        suffix_index: usize,
    ) -> Result<String> {
        let generator = FilenameGenerator::new(self.config, &self.resolver);
        match template.filename_pattern {
            Some(ref pattern) => generator.generate(pattern, fields, suffix_index),
            None => {
                let suffix = generator.suffix(suffix_index).ok_or_else(|| {
                    crate::Error::DuplicateExhausted(format!("no suffix at index {}", suffix_index))
                })?;
                let current = fields.text(Field::CurrentFilename).unwrap_or("");
                let extension = fields.text(Field::FileExtension).unwrap_or("");
                let stem = current.strip_suffix(extension).unwrap_or(current);
                Ok(format!("{}{}{}", stem, suffix, extension))
            }
        }
    }

    fn initial_filename(
        &self,
        template: &Template,
        fields: &FieldMap,
        file_index: usize,
    ) -> Result<String> {
        match template.filename_pattern {
            Some(_) => self.suffixed_filename(template, fields, file_index),
            None => Ok(fields
                .text(Field::CurrentFilename)
                .unwrap_or_default()
                .to_string()),
        }
    }

    fn directory(&self, template: &Template, fields: &FieldMap) -> PathBuf {
        match template.path_pattern {
            Some(ref pattern) => {
                let builder = PathBuilder::new(self.config, &self.resolver);
                PathBuf::from(builder.build(pattern, fields))
            }
            None => PathBuf::from(fields.text(Field::CurrentDirectory).unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(path: &str) -> FieldMap {
        let path = Path::new(path);
        let mut map = FieldMap::new();
        map.set_text(Field::CurrentPath, path.to_string_lossy());
        map.set_text(
            Field::CurrentFilename,
            path.file_name().unwrap().to_string_lossy(),
        );
        map.set_text(
            Field::CurrentDirectory,
            path.parent().unwrap().to_string_lossy(),
        );
        map.set_text(Field::FileExtension, ".zip");
        map.set_text(Field::Title, "Beach Day");
        map.set_text(Field::Studio, "Sunny");
        map.set_text(Field::Performer, "Jane Doe");
        map
    }

    fn template(filename: Option<&str>, path: Option<&str>) -> Template {
        Template {
            filename_pattern: filename.map(str::to_string),
            path_pattern: path.map(str::to_string),
            ..Template::default()
        }
    }

    #[test]
    fn test_plan_filename_only() {
        let config = Config::default();
        let planner = RenamePlanner::new(&config).unwrap();
        let planned = planner
            .plan(
                &template(Some("$studio - $title"), None),
                fields("/lib/old.zip"),
                Path::new("/lib/old.zip"),
                0,
            )
            .unwrap();
        assert_eq!(planned.intent.final_path(), PathBuf::from("/lib/Sunny - Beach Day.zip"));
        assert_eq!(planned.suffix_index, 0);
    }

    #[test]
    fn test_second_file_gets_suffix() {
        let config = Config::default();
        let planner = RenamePlanner::new(&config).unwrap();
        let planned = planner
            .plan(
                &template(Some("$title"), None),
                fields("/lib/old.zip"),
                Path::new("/lib/old.zip"),
                1,
            )
            .unwrap();
        assert_eq!(planned.intent.final_filename, "Beach Day_1.zip");
    }

    #[test]
    fn test_suffix_without_filename_template() {
        let config = Config::default();
        let planner = RenamePlanner::new(&config).unwrap();
        let t = template(None, Some("/lib/$studio"));
        let name = planner
            .suffixed_filename(&t, &fields("/in/old.zip"), 2)
            .unwrap();
        assert_eq!(name, "old_2.zip");
    }

    #[test]
    fn test_length_fallback_drops_fields_in_order() {
        let mut config = Config::default();
        config.path.order_field = vec!["$performer".to_string(), "$studio".to_string()];
        config.path.max_length = 30;
        let planner = RenamePlanner::new(&config).unwrap();

        // "/lib/Jane Doe Sunny Beach Day.zip" is 33 chars, without performer 24
        let planned = planner
            .plan(
                &template(Some("$performer $studio $title"), None),
                fields("/lib/old.zip"),
                Path::new("/lib/old.zip"),
                0,
            )
            .unwrap();
        assert_eq!(planned.intent.final_filename, "Sunny Beach Day.zip");
        assert!(!planned.fields.contains(Field::Performer));
        assert!(planned.fields.contains(Field::Studio));
    }

    #[test]
    fn test_length_error_when_all_dropped() {
        let mut config = Config::default();
        config.path.order_field = vec!["$performer".to_string(), "$studio".to_string()];
        config.path.max_length = 10;
        let planner = RenamePlanner::new(&config).unwrap();
        let result = planner.plan(
            &template(Some("$performer $studio $title"), None),
            fields("/lib/old.zip"),
            Path::new("/lib/old.zip"),
            0,
        );
        assert!(matches!(result, Err(crate::Error::Length { limit: 10, .. })));

        config.path.ignore_length = true;
        let planner = RenamePlanner::new(&config).unwrap();
        assert!(planner
            .plan(
                &template(Some("$performer $studio $title"), None),
                fields("/lib/old.zip"),
                Path::new("/lib/old.zip"),
                0,
            )
            .is_ok());
    }

    #[test]
    fn test_check_length_after_suffix() {
        let mut config = Config::default();
        config.path.max_length = 20;
        let planner = RenamePlanner::new(&config).unwrap();
        let mut intent = RenameIntent {
            current_path: PathBuf::from("/lib/old.zip"),
            final_directory: PathBuf::from("/lib"),
            final_filename: "Beach Day 12.zip".to_string(),
            file_index: 0,
        };
        // "/lib/Beach Day 12.zip" is 21 chars
        assert!(matches!(
            planner.check_length(&intent),
            Err(crate::Error::Length { length: 21, limit: 20, .. })
        ));

        intent.final_filename = "Beach Day.zip".to_string();
        assert!(planner.check_length(&intent).is_ok());
    }
}
