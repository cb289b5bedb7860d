//! Metadata records as reported by the metadata service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One item (gallery, scene...) with all its files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct MetadataRecord {
    pub id: String,
    pub title: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Rating out of 100.
    pub rating: Option<u32>,
    pub organized: bool,
    pub files: Vec<FileRef>,
    pub performers: Vec<Performer>,
    pub tags: Vec<Tag>,
    pub studio: Option<Studio>,
}

/// A physical file belonging to an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRef {
    pub path: PathBuf,
    /// Codec/dimension attributes, carried through as reported.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Performer attached to an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Performer {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default, alias = "rating100")]
    pub rating: Option<u32>,
    #[serde(default)]
    pub stash_ids: Vec<ExternalId>,
}

/// Identifier of a performer on an external database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalId {
    #[serde(default)]
    pub endpoint: String,
    pub stash_id: String,
}

/// Tag attached to an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// Studio with its embedded parent, if any.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Studio {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_studio: Option<StudioRef>,
}

/// Minimal studio reference used for parent links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioRef {
    pub id: String,
    pub name: String,
}

/// Wire shape covering both schema generations: a single `path` + `file`
/// before the file refactor, a `files` list after it.
#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, alias = "rating100")]
    rating: Option<u32>,
    #[serde(default)]
    organized: bool,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    file: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    files: Vec<FileRef>,
    #[serde(default)]
    performers: Vec<Performer>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    studio: Option<Studio>,
}

impl From<RawRecord> for MetadataRecord {
    fn from(raw: RawRecord) -> Self {
        let files = match raw.path {
            Some(path) => vec![FileRef {
                path,
                attributes: raw.file.unwrap_or_default(),
            }],
            None => raw.files,
        };

        Self {
            id: raw.id,
            title: raw.title.filter(|t| !t.is_empty()),
            date: raw.date.filter(|d| !d.is_empty()),
            rating: raw.rating,
            organized: raw.organized,
            files,
            performers: raw.performers,
            tags: raw.tags,
            studio: raw.studio,
        }
    }
}

impl MetadataRecord {
    /// Names of the tags attached to the item.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_refactored_record() {
        let json = r#"{
            "id": "12",
            "title": "Beach Day",
            "date": "2021-06-03",
            "rating100": 80,
            "organized": true,
            "files": [{"path": "/media/a.zip", "width": 1920}],
            "performers": [{"name": "Jane Doe", "gender": "FEMALE", "favorite": true,
                            "rating": 60, "stash_ids": [{"endpoint": "x", "stash_id": "abc"}]}],
            "tags": [{"id": "3", "name": "Outdoor"}],
            "studio": {"id": "7", "name": "Sub", "parent_studio": {"id": "8", "name": "Main"}}
        }"#;
        let record: MetadataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.rating, Some(80));
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.files[0].attributes["width"], 1920);
        assert_eq!(record.performers[0].stash_ids[0].stash_id, "abc");
        assert_eq!(
            record.studio.unwrap().parent_studio.unwrap().name,
            "Main"
        );
    }

    #[test]
    fn test_parse_legacy_record() {
        let json = r#"{
            "id": "5",
            "title": "",
            "path": "/media/old.zip",
            "file": {"duration": 12.5},
            "performers": [{"name": "A", "rating100": 20}],
            "tags": []
        }"#;
        let record: MetadataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title, None);
        assert_eq!(record.files[0].path, PathBuf::from("/media/old.zip"));
        assert_eq!(record.files[0].attributes["duration"], 12.5);
        assert_eq!(record.performers[0].rating, Some(20));
    }
}
