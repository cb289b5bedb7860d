//! Filename generator.

use crate::core::resolver::TemplateResolver;
use crate::models::config::Config;
use crate::models::fields::{Field, FieldMap};
use crate::utils::text;
use crate::Result;

/// Builds final filenames from a filename template.
pub struct FilenameGenerator<'a> {
    config: &'a Config,
    resolver: &'a TemplateResolver<'a>,
}

impl<'a> FilenameGenerator<'a> {
    pub fn new(config: &'a Config, resolver: &'a TemplateResolver<'a>) -> Self {
        Self { config, resolver }
    }

    /// Duplicate suffix for an index, if the list goes that far.
    pub fn suffix(&self, duplicate_index: usize) -> Option<&str> {
        self.config
            .filename
            .duplicate_suffix
            .get(duplicate_index)
            .map(String::as_str)
    }

    /// Generate the filename for `duplicate_index`.
    ///
    /// Format: `{resolved template}{suffix}{extension}`, then case transforms
    /// and character cleanup.
    pub fn generate(
        &self,
        template: &str,
        fields: &FieldMap,
        duplicate_index: usize,
    ) -> Result<String> {
        let suffix = self.suffix(duplicate_index).ok_or_else(|| {
            crate::Error::DuplicateExhausted(format!(
                "no suffix at index {} ({} configured)",
                duplicate_index,
                self.config.filename.duplicate_suffix.len()
            ))
        })?;
        let extension = fields.text(Field::FileExtension).unwrap_or("");

        let mut filename = format!(
            "{}{}{}",
            self.resolver.resolve_filename(template, fields),
            suffix,
            extension
        );

        if self.config.filename.lowercase {
            filename = filename.to_lowercase();
        }
        if self.config.filename.titlecase {
            filename = text::capitalize_words(&filename);
        }

        let filename = text::strip_illegal(&filename);
        let filename = text::remove_characters(&filename, &self.config.filename.remove_characters);
        Ok(text::normalize_quotes(&filename))
    }
}
