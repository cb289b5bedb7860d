//! Resolved templates and rename intents.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Behaviour modifier carried by a path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateOption {
    /// Compute the rename without performing it.
    DryRun,
    /// Remove the triggering tag(s) once the item is renamed.
    CleanTag,
    /// Reverse performer names ("First Last" → "Last First").
    InversePerformer,
}

impl TemplateOption {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dry_run" => Some(TemplateOption::DryRun),
            "clean_tag" => Some(TemplateOption::CleanTag),
            "inverse_performer" => Some(TemplateOption::InversePerformer),
            _ => None,
        }
    }
}

/// Templates that apply to one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub filename_pattern: Option<String>,
    pub path_pattern: Option<String>,
    pub options: BTreeSet<TemplateOption>,
    /// Tag ids to remove when `CleanTag` is set.
    pub clean_tag_ids: Vec<String>,
}

impl Template {
    pub fn has_option(&self, option: TemplateOption) -> bool {
        self.options.contains(&option)
    }

    /// Whether there is anything to resolve.
    pub fn is_empty(&self) -> bool {
        self.filename_pattern.is_none() && self.path_pattern.is_none()
    }
}

/// Marker replaced by the current directory in path patterns.
pub const GRAFT_MARKER: &str = "^*";

/// Where one file of an item should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameIntent {
    pub current_path: PathBuf,
    pub final_directory: PathBuf,
    pub final_filename: String,
    /// Position of the file among the item's files.
    pub file_index: usize,
}

impl RenameIntent {
    pub fn final_path(&self) -> PathBuf {
        self.final_directory.join(&self.final_filename)
    }

    pub fn current_directory(&self) -> &Path {
        self.current_path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn current_filename(&self) -> String {
        self.current_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Nothing to do: the file already sits at its computed path.
    pub fn is_noop(&self) -> bool {
        self.final_path() == self.current_path
    }

    /// Only the first file of an item carries sidecar files along.
    pub fn moves_sidecars(&self) -> bool {
        self.file_index == 0
    }
}
