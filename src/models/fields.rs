//! Closed set of template fields.

use std::collections::BTreeMap;
use std::fmt;

/// A field that template tokens can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Date,
    DateFormat,
    Rating,
    Performer,
    PerformerPath,
    StashIdPerformer,
    Studio,
    StudioFamily,
    ParentStudio,
    StudioHierarchy,
    Tags,
    CurrentPath,
    CurrentFilename,
    CurrentDirectory,
    FileExtension,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Title,
        Field::Date,
        Field::DateFormat,
        Field::Rating,
        Field::Performer,
        Field::PerformerPath,
        Field::StashIdPerformer,
        Field::Studio,
        Field::StudioFamily,
        Field::ParentStudio,
        Field::StudioHierarchy,
        Field::Tags,
        Field::CurrentPath,
        Field::CurrentFilename,
        Field::CurrentDirectory,
        Field::FileExtension,
    ];

    /// Token name without the `$`.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Date => "date",
            Field::DateFormat => "date_format",
            Field::Rating => "rating",
            Field::Performer => "performer",
            Field::PerformerPath => "performer_path",
            Field::StashIdPerformer => "stashid_performer",
            Field::Studio => "studio",
            Field::StudioFamily => "studio_family",
            Field::ParentStudio => "parent_studio",
            Field::StudioHierarchy => "studio_hierarchy",
            Field::Tags => "tags",
            Field::CurrentPath => "current_path",
            Field::CurrentFilename => "current_filename",
            Field::CurrentDirectory => "current_directory",
            Field::FileExtension => "file_extension",
        }
    }

    /// Look a field up by token name; a leading `$` is accepted.
    pub fn from_token(token: &str) -> Option<Field> {
        let name = token.strip_prefix('$').unwrap_or(token);
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Path-structural fields keep their spaces when a whitespace separator
    /// is configured.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Field::CurrentPath | Field::CurrentFilename | Field::CurrentDirectory
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name())
    }
}

/// Value of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

/// Extracted fields of one file. Absent fields are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    values: BTreeMap<Field, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a text field. Empty text leaves the field absent.
    pub fn set_text(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, FieldValue::Text(value));
        }
    }

    /// Set a list field. An empty list leaves the field absent.
    pub fn set_list(&mut self, field: Field, values: Vec<String>) {
        if values.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, FieldValue::List(values));
        }
    }

    /// Text value of a field; list fields have no text form.
    pub fn text(&self, field: Field) -> Option<&str> {
        match self.values.get(&field) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn list(&self, field: Field) -> Option<&[String]> {
        match self.values.get(&field) {
            Some(FieldValue::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn remove(&mut self, field: Field) -> Option<FieldValue> {
        self.values.remove(&field)
    }

    /// Replace literal spaces in every non-structural field.
    pub fn replace_whitespace(&mut self, separator: &str) {
        for (field, value) in self.values.iter_mut() {
            if field.is_structural() {
                continue;
            }
            match value {
                FieldValue::Text(s) => *s = s.replace(' ', separator),
                FieldValue::List(v) => {
                    for s in v.iter_mut() {
                        *s = s.replace(' ', separator);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(Field::from_token("$title"), Some(Field::Title));
        assert_eq!(Field::from_token("performer_path"), Some(Field::PerformerPath));
        assert_eq!(Field::from_token("$unknown"), None);
    }

    #[test]
    fn test_empty_values_are_absent() {
        let mut map = FieldMap::new();
        map.set_text(Field::Title, "");
        map.set_list(Field::StudioHierarchy, vec![]);
        assert!(!map.contains(Field::Title));
        assert!(!map.contains(Field::StudioHierarchy));
    }

    #[test]
    fn test_replace_whitespace_skips_structural() {
        let mut map = FieldMap::new();
        map.set_text(Field::Title, "Beach Day");
        map.set_text(Field::CurrentDirectory, "/my media");
        map.set_list(Field::StudioHierarchy, vec!["Big Studio".to_string()]);
        map.replace_whitespace(".");
        assert_eq!(map.text(Field::Title), Some("Beach.Day"));
        assert_eq!(map.text(Field::CurrentDirectory), Some("/my media"));
        assert_eq!(map.list(Field::StudioHierarchy).unwrap()[0], "Big.Studio");
    }
}
