//! Destination directory generator.
//!
//! A path template is split into segments which are resolved one by one:
//! 1. `^*` is replaced by the current directory before splitting
//! 2. A `$studio_hierarchy` segment expands to one folder per studio
//! 3. Every segment is stripped of illegal characters; segments with tokens
//!    are also cleaned up and trimmed
//! 4. Empty segments are dropped, the leading root excepted
//! 5. Consecutive identical folders collapse when configured

use crate::core::resolver::TemplateResolver;
use crate::models::config::Config;
use crate::models::fields::{Field, FieldMap};
use crate::models::template::GRAFT_MARKER;
use crate::utils::text;
use std::path::MAIN_SEPARATOR;

const STUDIO_HIERARCHY_SEGMENT: &str = "$studio_hierarchy";

/// Builds destination directories from a path template.
pub struct PathBuilder<'a> {
    config: &'a Config,
    resolver: &'a TemplateResolver<'a>,
}

impl<'a> PathBuilder<'a> {
    pub fn new(config: &'a Config, resolver: &'a TemplateResolver<'a>) -> Self {
        Self { config, resolver }
    }

    /// Resolve `destination` into a directory path.
    pub fn build(&self, destination: &str, fields: &FieldMap) -> String {
        let current_directory = fields.text(Field::CurrentDirectory).unwrap_or("");
        let grafted = destination.contains(GRAFT_MARKER);
        let destination = destination.replace(GRAFT_MARKER, current_directory);

        let template_segments = split_segments(&destination);
        let leading_root = template_segments.first().map(|s| s.is_empty()).unwrap_or(false);

        let mut segments = Vec::with_capacity(template_segments.len());
        for (position, segment) in template_segments.iter().enumerate() {
            if position == 0 && is_drive(segment) {
                segments.push(segment.to_string());
            } else if *segment == STUDIO_HIERARCHY_SEGMENT {
                if let Some(studios) = fields.list(Field::StudioHierarchy) {
                    segments.extend(studios.iter().map(|s| sanitize_segment(s)));
                }
            } else if !segment.contains('$') {
                segments.push(text::strip_illegal(segment));
            } else {
                segments.push(sanitize_segment(&self.resolver.resolve_segment(segment, fields)));
            }
        }

        let mut segments: Vec<String> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        if leading_root {
            segments.insert(0, String::new());
        }

        if self.config.path.prevent_consecutive {
            segments.dedup();
        }

        if grafted {
            segments = collapse_graft(segments, current_directory);
        }

        let joined = join_segments(&segments);
        let joined = text::remove_characters(&joined, &self.config.filename.remove_characters);
        text::normalize_quotes(&joined)
    }
}

/// Split a path on both separators, skipping `.` components.
fn split_segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .enumerate()
        .filter(|(i, s)| *i == 0 || (!s.is_empty() && *s != "."))
        .map(|(_, s)| s)
        .collect()
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn sanitize_segment(segment: &str) -> String {
    text::strip_illegal(segment).trim().to_string()
}

fn join_segments(segments: &[String]) -> String {
    match segments {
        [only] if only.is_empty() => MAIN_SEPARATOR.to_string(),
        _ => segments.join(&MAIN_SEPARATOR.to_string()),
    }
}

/// A grafted path whose added folders already appear in the current
/// directory stays in the current directory, so repeated runs don't nest.
fn collapse_graft(segments: Vec<String>, current_directory: &str) -> Vec<String> {
    let current: Vec<String> = split_segments(current_directory)
        .into_iter()
        .map(str::to_string)
        .collect();
    if segments.len() <= current.len() || segments[..current.len()] != current[..] {
        return segments;
    }
    let extra = &segments[current.len()..];
    if extra.iter().all(|s| current.contains(s)) {
        tracing::debug!("Grafted folders already in the current directory, keeping it");
        return current;
    }
    segments
}
