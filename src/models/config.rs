//! Configuration model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metadata service connection.
    pub server: ServerConfig,
    /// Invocation-wide switches.
    pub general: GeneralConfig,
    /// Filename templates and finishing rules.
    pub filename: FilenameConfig,
    /// Path templates and folder rules.
    pub path: PathConfig,
    /// Field extraction rules.
    pub fields: FieldsConfig,
    /// Handling of processes that hold a file open.
    pub process: ProcessConfig,
}

/// Metadata service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the service (the GraphQL endpoint is `{url}/graphql`).
    pub url: String,
    /// API key sent as `ApiKey` header.
    pub api_key: Option<String>,
    /// Session cookie value.
    pub session_cookie: Option<String>,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9999".to_string(),
            api_key: None,
            session_cookie: None,
            timeout: 20,
        }
    }
}

/// Direction for bulk mode ordering by update time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Whether hook mode is allowed to run.
    pub enable_hook: bool,
    /// Compute paths without touching disk or index.
    pub dry_run: bool,
    /// Keep previous dry-run results instead of truncating them.
    pub dry_run_append: bool,
    /// Audit log (`id|old|new` per rename).
    pub log_file: Option<PathBuf>,
    /// Skip items that are not flagged as organized.
    pub only_organized: bool,
    /// Items fetched per bulk run.
    pub batch_size: u32,
    /// Bulk ordering by update time.
    pub bulk_direction: SortDirection,
    /// Override for the index database path reported by the service.
    pub database_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enable_hook: true,
            dry_run: false,
            dry_run_append: true,
            log_file: None,
            only_organized: false,
            batch_size: 500,
            bulk_direction: SortDirection::Asc,
            database_path: None,
        }
    }
}

impl GeneralConfig {
    /// File receiving the intended renames when running dry.
    pub fn dry_run_file(&self) -> Option<PathBuf> {
        self.log_file.as_ref().map(|log| {
            log.parent()
                .unwrap_or_else(|| Path::new(""))
                .join("media_renamer_dryrun.txt")
        })
    }
}

/// Tag → template rule. Rules are checked in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTemplate {
    pub tag: String,
    pub template: String,
}

/// Path prefix → destination rule. Rules are checked in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplate {
    pub prefix: String,
    pub destination: String,
}

/// How a replace-word rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceMode {
    /// Only between separators (space, `_`, `-`).
    #[default]
    Word,
    /// Any substring.
    Any,
    /// Regular expression.
    Regex,
}

/// Literal text replacement applied after token substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRule {
    pub find: String,
    pub replace: String,
    #[serde(default)]
    pub mode: ReplaceMode,
}

/// Per-field find/replace applied to the field value before substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReplacer {
    pub replace: String,
    pub with: String,
}

/// Filename configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilenameConfig {
    pub use_default_template: bool,
    pub default_template: String,
    /// Studio name → template.
    pub studio_templates: HashMap<String, String>,
    pub tag_templates: Vec<TagTemplate>,
    /// Replaces spaces in the resolved filename.
    pub splitchar: String,
    pub lowercase: bool,
    pub titlecase: bool,
    /// Characters removed from filenames and paths.
    pub remove_characters: String,
    pub replace_words: Vec<ReplaceRule>,
    /// Keyed by token, e.g. `$studio`.
    pub field_replacer: HashMap<String, FieldReplacer>,
    /// Indexed by the duplicate index of the file.
    pub duplicate_suffix: Vec<String>,
    /// Use the current filename when the item has no title.
    pub filename_as_title: bool,
    pub prepositions_removal: bool,
    pub prepositions_list: Vec<String>,
}

impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            use_default_template: false,
            default_template: "$date $title".to_string(),
            studio_templates: HashMap::new(),
            tag_templates: Vec::new(),
            splitchar: " ".to_string(),
            lowercase: false,
            titlecase: false,
            remove_characters: String::new(),
            replace_words: Vec::new(),
            field_replacer: HashMap::new(),
            duplicate_suffix: ["", "_1", "_2", "_3", "_4", "_5", "_6", "_7", "_8", "_9", "_10"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            filename_as_title: false,
            prepositions_removal: false,
            prepositions_list: ["The", "A", "An"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub use_default_template: bool,
    pub default_template: String,
    /// Studio name → destination.
    pub studio_templates: HashMap<String, String>,
    pub tag_templates: Vec<TagTemplate>,
    pub path_templates: Vec<PathTemplate>,
    /// Tag name → template options.
    pub tag_options: HashMap<String, Vec<String>>,
    /// Destination used for items that are not organized.
    pub non_organized: Option<String>,
    /// Collapse identical consecutive folders.
    pub prevent_consecutive: bool,
    pub remove_empty_folder: bool,
    /// Keep the performer already present in the current path.
    pub keep_already_performer: bool,
    /// `$performer` in paths resolves to a single performer.
    pub one_performer: bool,
    /// Use a `NoPerformer` folder when the item has no performer.
    pub no_performer_folder: bool,
    pub ignore_length: bool,
    pub max_length: usize,
    /// Fields dropped in order when the path is too long, e.g. `$performer`.
    pub order_field: Vec<String>,
    /// Sidecar extensions renamed with the first file (without the dot).
    pub associated_extensions: Vec<String>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            use_default_template: false,
            default_template: String::new(),
            studio_templates: HashMap::new(),
            tag_templates: Vec::new(),
            path_templates: Vec::new(),
            tag_options: HashMap::new(),
            non_organized: None,
            prevent_consecutive: true,
            remove_empty_folder: false,
            keep_already_performer: false,
            one_performer: true,
            no_performer_folder: false,
            ignore_length: false,
            max_length: 240,
            order_field: Vec::new(),
            associated_extensions: Vec::new(),
        }
    }
}

/// Performer ordering mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformerSort {
    Rating,
    Favorite,
    Mix,
    Mixid,
    Name,
    /// Keep the order reported by the service.
    #[default]
    None,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    /// strftime pattern for `$date_format`.
    pub date_format: String,
    /// `{}` is replaced by the rating.
    pub rating_format: String,
    /// Replaces spaces in every derived field.
    pub whitespace_separator: Option<String>,
    pub squeeze_studio_names: bool,
    pub performer_splitchar: String,
    pub performer_limit: usize,
    pub performer_limit_keep: bool,
    pub performer_sort: PerformerSort,
    /// Genders to skip; `UNDEFINED` skips performers without gender.
    pub performer_ignore_gender: Vec<String>,
    /// Drop `$performer` before `$title` when the title starts with it.
    pub prevent_title_performer: bool,
    pub tags_splitchar: String,
    pub tags_whitelist: Vec<String>,
    pub tags_blacklist: Vec<String>,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
            rating_format: "{}".to_string(),
            whitespace_separator: None,
            squeeze_studio_names: false,
            performer_splitchar: " ".to_string(),
            performer_limit: 3,
            performer_limit_keep: false,
            performer_sort: PerformerSort::Rating,
            performer_ignore_gender: Vec::new(),
            prevent_title_performer: true,
            tags_splitchar: " ".to_string(),
            tags_whitelist: Vec::new(),
            tags_blacklist: Vec::new(),
        }
    }
}

/// Process handling configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Terminate processes holding the file, then retry once.
    pub kill_attached: bool,
    /// Report every holder instead of the first one.
    pub get_all: bool,
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_renamer")
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs_config_path().join("config.toml")
}

/// Load configuration from file. A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> crate::Result<Config> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        tracing::debug!("No config at {:?}, using defaults", config_path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&config_path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Check values that serde cannot.
    pub fn validate(&self) -> crate::Result<()> {
        if self.filename.duplicate_suffix.is_empty() {
            return Err(crate::Error::Config(
                "filename.duplicate_suffix needs at least one entry".to_string(),
            ));
        }
        for rule in &self.filename.replace_words {
            if rule.mode == ReplaceMode::Regex {
                regex::Regex::new(&rule.find).map_err(|e| {
                    crate::Error::Config(format!("invalid replace_words regex '{}': {}", rule.find, e))
                })?;
            }
        }
        Ok(())
    }
}

/// Flip or set a boolean key inside the config file, keeping other values.
///
/// `key` is dotted, e.g. `general.dry_run`. Returns the new value.
pub fn set_config_flag(path: &Path, key: &str, value: Option<bool>) -> crate::Result<bool> {
    let mut table: toml::Table = if path.exists() {
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        toml::Table::new()
    };

    let (section, name) = key
        .split_once('.')
        .ok_or_else(|| crate::Error::Config(format!("not a dotted key: {}", key)))?;

    let section_table = table
        .entry(section)
        .or_insert(toml::Value::Table(toml::Table::new()))
        .as_table_mut()
        .ok_or_else(|| crate::Error::Config(format!("[{}] is not a table", section)))?;

    let current = match section_table.get(name) {
        Some(v) => v.as_bool(),
        None => None,
    };
    let defaults = Config::default();
    let current = current.unwrap_or(match key {
        "general.enable_hook" => defaults.general.enable_hook,
        "general.dry_run" => defaults.general.dry_run,
        _ => false,
    });
    let new_value = value.unwrap_or(!current);
    section_table.insert(name.to_string(), toml::Value::Boolean(new_value));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(&table)
        .map_err(|e| crate::Error::Config(format!("failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;

    tracing::info!("{} = {}", key, new_value);
    Ok(new_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.path.max_length, 240);
        assert_eq!(config.filename.duplicate_suffix[0], "");
        assert_eq!(config.fields.performer_sort, PerformerSort::Rating);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let content = r#"
            [general]
            dry_run = true

            [fields]
            performer_sort = "mixid"

            [[filename.replace_words]]
            find = "And"
            replace = "&"

            [[filename.tag_templates]]
            tag = "Vacation"
            template = "$date - $title"
        "#;
        let config: Config = toml::from_str(content).unwrap();
        assert!(config.general.dry_run);
        assert_eq!(config.fields.performer_sort, PerformerSort::Mixid);
        assert_eq!(config.filename.replace_words[0].mode, ReplaceMode::Word);
        assert_eq!(config.filename.tag_templates[0].tag, "Vacation");
        // untouched sections keep their defaults
        assert_eq!(config.path.max_length, 240);
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let mut config = Config::default();
        config.filename.replace_words.push(ReplaceRule {
            find: "(".to_string(),
            replace: String::new(),
            mode: ReplaceMode::Regex,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dry_run_file_next_to_log() {
        let general = GeneralConfig {
            log_file: Some(PathBuf::from("/var/log/renamer/rename.log")),
            ..Default::default()
        };
        assert_eq!(
            general.dry_run_file(),
            Some(PathBuf::from("/var/log/renamer/media_renamer_dryrun.txt"))
        );
    }

    #[test]
    fn test_set_config_flag_toggles() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[general]\nbatch_size = 10\n").unwrap();

        assert!(set_config_flag(&path, "general.dry_run", None).unwrap());
        assert!(!set_config_flag(&path, "general.dry_run", None).unwrap());
        assert!(!set_config_flag(&path, "general.enable_hook", Some(false)).unwrap());

        let config = load_config(Some(&path)).unwrap();
        assert!(!config.general.dry_run);
        assert!(!config.general.enable_hook);
        assert_eq!(config.general.batch_size, 10);
    }

    #[test]
    fn test_missing_config_gives_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/config.toml"))).unwrap();
        assert!(config.general.enable_hook);
    }
}
