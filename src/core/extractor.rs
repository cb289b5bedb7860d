//! Field extraction from metadata records.
//!
//! Turns one record plus the path of one of its files into a [`FieldMap`].
//! The map is rebuilt for every file since files of one item can live in
//! different directories.

use crate::models::config::{Config, PerformerSort};
use crate::models::fields::{Field, FieldMap};
use crate::models::record::{MetadataRecord, Performer, StudioRef};
use crate::models::template::{Template, TemplateOption};
use crate::services::graphql::MetadataService;
use crate::utils::fs::dotted_extension;
use crate::Result;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;
use std::sync::OnceLock;

/// Placeholder folder for items without performers.
pub const NO_PERFORMER_FOLDER: &str = "NoPerformer";

/// Gender value that matches performers without a gender.
pub const UNDEFINED_GENDER: &str = "UNDEFINED";

fn inverse_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-zA-Z]+)(\s)([a-zA-Z]+)").expect("static regex is valid"))
}

/// Walk the studio parents of an item, leaf first.
///
/// The parent embedded in the record is trusted as is; only ancestors above
/// it are looked up.
pub fn resolve_studio_chain(
    record: &MetadataRecord,
    service: &dyn MetadataService,
) -> Result<Vec<StudioRef>> {
    let Some(ref studio) = record.studio else {
        return Ok(Vec::new());
    };

    let mut chain = vec![StudioRef {
        id: studio.id.clone(),
        name: studio.name.clone(),
    }];
    let mut seen: HashSet<String> = HashSet::from([studio.id.clone()]);
    let mut next = studio.parent_studio.clone();

    while let Some(parent) = next {
        if !seen.insert(parent.id.clone()) {
            tracing::warn!("Studio hierarchy loops at '{}', stopping", parent.name);
            break;
        }
        chain.push(parent.clone());
        next = service
            .find_studio(&parent.id)?
            .and_then(|s| s.parent_studio);
    }

    Ok(chain)
}

/// "First Last" → "Last First".
pub fn inverse_name(name: &str) -> String {
    inverse_name_regex().replace_all(name, "$3 $1").into_owned()
}

/// Builds field maps.
pub struct FieldExtractor<'a> {
    config: &'a Config,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Extract the fields of one file of `record`.
    ///
    /// `studio_chain` is leaf first, as returned by [`resolve_studio_chain`].
    pub fn extract(
        &self,
        record: &MetadataRecord,
        file_path: &Path,
        template: &Template,
        studio_chain: &[StudioRef],
    ) -> FieldMap {
        let mut fields = FieldMap::new();

        let extension = dotted_extension(file_path);
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let directory = file_path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        fields.set_text(Field::CurrentPath, file_path.to_string_lossy());
        fields.set_text(Field::CurrentFilename, filename.clone());
        fields.set_text(Field::CurrentDirectory, directory);
        fields.set_text(Field::FileExtension, extension.clone());

        if let Some(title) = self.title(record, &filename, &extension) {
            fields.set_text(Field::Title, title);
        }

        if let Some(ref date) = record.date {
            fields.set_text(Field::Date, date.clone());
            if let Some(formatted) = self.format_date(date) {
                fields.set_text(Field::DateFormat, formatted);
            }
        }

        if let Some(rating) = record.rating.filter(|r| *r != 0) {
            fields.set_text(
                Field::Rating,
                self.config.fields.rating_format.replace("{}", &rating.to_string()),
            );
        }

        self.performers(record, file_path, template, &mut fields);
        self.studios(studio_chain, &mut fields);
        self.tags(record, &mut fields);

        if let Some(ref separator) = self.config.fields.whitespace_separator {
            fields.replace_whitespace(separator);
        }

        fields
    }

    fn title(&self, record: &MetadataRecord, filename: &str, extension: &str) -> Option<String> {
        let raw = match record.title {
            Some(ref t) => t.clone(),
            None if self.config.filename.filename_as_title => filename.to_string(),
            None => return None,
        };

        let mut title = if extension.is_empty() {
            raw
        } else {
            raw.strip_suffix(extension).map(str::to_string).unwrap_or(raw)
        };

        if self.config.filename.prepositions_removal {
            for word in &self.config.filename.prepositions_list {
                let pattern = format!(r"^{}[\s_-]", regex::escape(word));
                if let Ok(re) = Regex::new(&pattern) {
                    title = re.replace(&title, "").into_owned();
                }
            }
        }
        Some(title)
    }

    fn format_date(&self, date: &str) -> Option<String> {
        let parsed = match chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Unparseable date '{}': {}", date, e);
                return None;
            }
        };
        let mut out = String::new();
        if write!(out, "{}", parsed.format(&self.config.fields.date_format)).is_err() {
            tracing::warn!("Invalid date_format '{}'", self.config.fields.date_format);
            return None;
        }
        Some(out)
    }

    fn performers(
        &self,
        record: &MetadataRecord,
        file_path: &Path,
        template: &Template,
        fields: &mut FieldMap,
    ) {
        let cfg = &self.config.fields;
        let path_cfg = &self.config.path;

        if record.performers.is_empty() {
            if path_cfg.no_performer_folder {
                fields.set_text(Field::PerformerPath, NO_PERFORMER_FOLDER);
            }
            return;
        }

        let inverse = template.has_option(TemplateOption::InversePerformer);
        let path_segments: Vec<String> = file_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        let mut kept: Vec<(String, &Performer)> = Vec::new();
        let mut path_performer: Option<String> = None;

        for performer in &record.performers {
            if self.ignored_gender(performer) {
                continue;
            }
            let name = if inverse {
                inverse_name(&performer.name)
            } else {
                performer.name.clone()
            };
            if path_cfg.keep_already_performer
                && path_performer.is_none()
                && path_segments.iter().any(|s| *s == name)
            {
                tracing::debug!("[PATH] Keeping the current name of the performer '{}'", name);
                path_performer = Some(name.clone());
            }
            kept.push((name, performer));
        }

        let mut ordered = sort_performers(&kept, cfg.performer_sort);

        if path_performer.is_none() {
            path_performer = ordered.first().map(|i| kept[*i].0.clone());
        }

        if ordered.len() > cfg.performer_limit {
            if cfg.performer_limit_keep {
                tracing::info!("Limited the amount of performer to {}", cfg.performer_limit);
                ordered.truncate(cfg.performer_limit);
            } else {
                tracing::info!(
                    "More than {} performer(s). Ignoring $performer",
                    cfg.performer_limit
                );
                ordered.clear();
            }
        }

        let names: Vec<&str> = ordered.iter().map(|i| kept[*i].0.as_str()).collect();
        fields.set_text(Field::Performer, names.join(&cfg.performer_splitchar));

        let stash_ids: Vec<&str> = ordered
            .iter()
            .filter_map(|i| kept[*i].1.stash_ids.first())
            .map(|s| s.stash_id.as_str())
            .collect();
        fields.set_text(Field::StashIdPerformer, stash_ids.join(&cfg.performer_splitchar));

        if path_cfg.one_performer {
            if let Some(name) = path_performer {
                fields.set_text(Field::PerformerPath, name);
            }
        } else {
            fields.set_text(Field::PerformerPath, names.join(&cfg.performer_splitchar));
        }
    }

    fn ignored_gender(&self, performer: &Performer) -> bool {
        let ignored = &self.config.fields.performer_ignore_gender;
        match performer.gender {
            Some(ref gender) => ignored.iter().any(|g| g == gender),
            None => ignored.iter().any(|g| g == UNDEFINED_GENDER),
        }
    }

    fn studios(&self, chain: &[StudioRef], fields: &mut FieldMap) {
        let squeeze = |name: &str| {
            if self.config.fields.squeeze_studio_names {
                name.replace(' ', "")
            } else {
                name.to_string()
            }
        };

        let Some(leaf) = chain.first() else {
            return;
        };
        let studio = squeeze(&leaf.name);
        fields.set_text(Field::Studio, studio.clone());

        match chain.get(1) {
            Some(parent) => {
                let parent = squeeze(&parent.name);
                fields.set_text(Field::ParentStudio, parent.clone());
                fields.set_text(Field::StudioFamily, parent);
            }
            None => fields.set_text(Field::StudioFamily, studio),
        }

        let hierarchy: Vec<String> = chain.iter().rev().map(|s| squeeze(&s.name)).collect();
        fields.set_list(Field::StudioHierarchy, hierarchy);
    }

    fn tags(&self, record: &MetadataRecord, fields: &mut FieldMap) {
        let cfg = &self.config.fields;
        let names: Vec<&str> = record
            .tags
            .iter()
            .map(|t| t.name.as_str())
            .filter(|name| !cfg.tags_blacklist.iter().any(|b| b == name))
            .filter(|name| {
                cfg.tags_whitelist.is_empty() || cfg.tags_whitelist.iter().any(|w| w == name)
            })
            .collect();
        fields.set_text(Field::Tags, names.join(&cfg.tags_splitchar));
    }
}

/// Order performers, returning indices into `performers`.
///
/// Ratings group from high to low, a missing rating counting as 0.
pub fn sort_performers(performers: &[(String, &Performer)], mode: PerformerSort) -> Vec<usize> {
    let rating = |i: usize| performers[i].1.rating.unwrap_or(0);
    let name = |i: usize| performers[i].0.as_str();
    let all: Vec<usize> = (0..performers.len()).collect();

    let favorites: Vec<usize> = all
        .iter()
        .copied()
        .filter(|i| performers[*i].1.favorite)
        .collect();
    let others: Vec<usize> = all
        .iter()
        .copied()
        .filter(|i| !performers[*i].1.favorite)
        .collect();

    // Rating groups, highest first, each keeping insertion order.
    let rating_groups = || {
        let mut ratings: Vec<u32> = all.iter().map(|i| rating(*i)).collect();
        ratings.sort_unstable_by(|a, b| b.cmp(a));
        ratings.dedup();
        ratings
            .into_iter()
            .map(|r| all.iter().copied().filter(|i| rating(*i) == r).collect::<Vec<_>>())
            .collect::<Vec<_>>()
    };
    let by_name = |mut group: Vec<usize>| {
        group.sort_by(|a, b| name(*a).cmp(name(*b)));
        group
    };

    let mut ordered: Vec<usize> = Vec::new();
    let push_unique = |ordered: &mut Vec<usize>, group: Vec<usize>| {
        for i in group {
            if !ordered.iter().any(|o| name(*o) == name(i)) {
                ordered.push(i);
            }
        }
    };

    match mode {
        PerformerSort::Rating => {
            for group in rating_groups() {
                push_unique(&mut ordered, by_name(group));
            }
        }
        PerformerSort::Favorite => {
            push_unique(&mut ordered, by_name(favorites));
            push_unique(&mut ordered, by_name(others));
        }
        PerformerSort::Mix => {
            push_unique(&mut ordered, by_name(favorites));
            for group in rating_groups() {
                push_unique(&mut ordered, by_name(group));
            }
        }
        PerformerSort::Mixid => {
            push_unique(&mut ordered, favorites);
            for group in rating_groups() {
                push_unique(&mut ordered, group);
            }
        }
        PerformerSort::Name => {
            ordered = by_name(all.clone());
        }
        PerformerSort::None => {
            ordered = all.clone();
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn performer(name: &str, rating: u32, favorite: bool) -> Performer {
        Performer {
            name: name.to_string(),
            rating: Some(rating),
            favorite,
            ..Default::default()
        }
    }

    fn names(performers: &[Performer], mode: PerformerSort) -> Vec<String> {
        let pairs: Vec<(String, &Performer)> =
            performers.iter().map(|p| (p.name.clone(), p)).collect();
        sort_performers(&pairs, mode)
            .into_iter()
            .map(|i| pairs[i].0.clone())
            .collect()
    }

    #[test]
    fn test_sort_by_rating() {
        let list = vec![
            performer("A", 0, false),
            performer("C", 5, false),
            performer("B", 5, false),
            performer("D", 3, false),
        ];
        assert_eq!(names(&list, PerformerSort::Rating), vec!["B", "C", "D", "A"]);
    }

    #[test]
    fn test_sort_by_favorite() {
        let list = vec![
            performer("Zoe", 1, true),
            performer("Amy", 9, false),
            performer("Bea", 1, true),
        ];
        assert_eq!(names(&list, PerformerSort::Favorite), vec!["Bea", "Zoe", "Amy"]);
    }

    #[test]
    fn test_sort_mix_and_mixid() {
        let list = vec![
            performer("Zoe", 1, true),
            performer("Dan", 9, false),
            performer("Bea", 1, true),
            performer("Cal", 9, false),
        ];
        assert_eq!(names(&list, PerformerSort::Mix), vec!["Bea", "Zoe", "Cal", "Dan"]);
        assert_eq!(names(&list, PerformerSort::Mixid), vec!["Zoe", "Bea", "Dan", "Cal"]);
    }

    #[test]
    fn test_sort_name_and_none() {
        let list = vec![performer("B", 1, false), performer("A", 2, false)];
        assert_eq!(names(&list, PerformerSort::Name), vec!["A", "B"]);
        assert_eq!(names(&list, PerformerSort::None), vec!["B", "A"]);
    }

    #[test]
    fn test_inverse_name() {
        assert_eq!(inverse_name("Jane Doe"), "Doe Jane");
        assert_eq!(inverse_name("Prince"), "Prince");
    }
}
