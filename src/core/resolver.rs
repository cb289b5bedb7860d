//! Template token resolution.
//!
//! Expands `$field` tokens against a [`FieldMap`]:
//! 1. Tokens are substituted longest first so `$date` never eats `$date_format`
//! 2. Empty fields remove their token, underscores glued to it included
//! 3. Replace-word rules run on the substituted text
//! 4. Cleanup removes empty groups and repeated punctuation
//! 5. The title is inserted last so cleanup never touches it

use crate::models::config::{Config, ReplaceMode};
use crate::models::fields::{Field, FieldMap};
use crate::utils::text;
use crate::Result;
use regex::Regex;
use std::sync::OnceLock;

const TITLE_PLACEHOLDER: &str = "$title";

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\w+").expect("static regex is valid"))
}

/// Replace-word rule with its pattern compiled.
#[derive(Debug)]
enum CompiledRule {
    Pattern { regex: Regex, replace: String },
    Any { find: String, replace: String },
}

/// Output of token substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Text with every token but `$title` substituted.
    pub text: String,
    /// Title value, kept apart so it can be inserted after cleanup.
    pub title: Option<String>,
}

/// A `$token` occurrence in a template.
#[derive(Debug, Clone)]
struct Token {
    /// Matched text, e.g. `$title_`.
    raw: String,
    /// Name with glued underscores trimmed, e.g. `title`.
    name: String,
}

impl Token {
    fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            name: raw[1..].trim_matches('_').to_string(),
        }
    }

    /// Underscores glued before and after the name.
    fn glue(&self) -> (&str, &str) {
        let body = &self.raw[1..];
        let lead_len = body.len() - body.trim_start_matches('_').len();
        let trail_len = body.len() - body.trim_end_matches('_').len();
        (&body[..lead_len], &body[body.len() - trail_len..])
    }
}

/// Expands templates against field maps.
pub struct TemplateResolver<'a> {
    config: &'a Config,
    rules: Vec<CompiledRule>,
}

impl<'a> TemplateResolver<'a> {
    /// Create a resolver, compiling the replace-word rules.
    pub fn new(config: &'a Config) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.filename.replace_words.len());
        for rule in &config.filename.replace_words {
            let compiled = match rule.mode {
                ReplaceMode::Regex => CompiledRule::Pattern {
                    regex: Regex::new(&rule.find).map_err(|e| {
                        crate::Error::Config(format!("invalid regex '{}': {}", rule.find, e))
                    })?,
                    replace: rule.replace.clone(),
                },
                ReplaceMode::Word => CompiledRule::Pattern {
                    regex: Regex::new(&format!(
                        r"([\s_-])({})([\s_-])",
                        regex::escape(&rule.find)
                    ))
                    .map_err(|e| crate::Error::Config(e.to_string()))?,
                    replace: format!("${{1}}{}${{3}}", rule.replace.replace('$', "$$")),
                },
                ReplaceMode::Any => CompiledRule::Any {
                    find: rule.find.clone(),
                    replace: rule.replace.clone(),
                },
            };
            rules.push(compiled);
        }
        Ok(Self { config, rules })
    }

    /// Substitute every token except the title.
    ///
    /// In path mode `$performer` resolves to the path performer and the
    /// performer/title duplicate rule is off.
    pub fn substitute(&self, template: &str, fields: &FieldMap, path_mode: bool) -> Resolved {
        let tokens: Vec<Token> = token_regex()
            .find_iter(template)
            .map(|m| Token::parse(m.as_str()))
            .collect();

        let skip_performer = !path_mode && self.performer_prefixes_title(&tokens, fields);

        let mut ordered = tokens.clone();
        ordered.sort_by(|a, b| b.raw.len().cmp(&a.raw.len()));

        let mut result = template.to_string();
        let mut title = None;

        for token in &ordered {
            let name = if path_mode && token.name == "performer" {
                Field::PerformerPath.name()
            } else {
                token.name.as_str()
            };

            if name == "performer" && skip_performer {
                tracing::debug!("Ignoring the performer field because it's already in start of title");
                result = result.replace(&token.raw, "");
                continue;
            }

            let mut value = Field::from_token(name)
                .and_then(|f| fields.text(f))
                .unwrap_or("")
                .to_string();

            if let Some(replacer) = self.config.filename.field_replacer.get(&format!("${}", name)) {
                value = value.replace(&replacer.replace, &replacer.with);
            }

            if name == Field::Title.name() {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    title = Some(trimmed.to_string());
                }
                continue;
            }

            if value.is_empty() {
                result = result.replace(&token.raw, "");
            } else {
                let (lead, trail) = token.glue();
                result = result.replace(&token.raw, &format!("{}{}{}", lead, value, trail));
            }
        }

        // Every spelling of the title token collapses to the placeholder.
        for token in tokens.iter().filter(|t| t.name == Field::Title.name()) {
            let (lead, trail) = token.glue();
            result = result.replace(&token.raw, &format!("{}{}{}", lead, TITLE_PLACEHOLDER, trail));
        }

        Resolved {
            text: result,
            title,
        }
    }

    /// `$performer` directly followed by `$title` while the title already
    /// starts with the performer text.
    fn performer_prefixes_title(&self, tokens: &[Token], fields: &FieldMap) -> bool {
        if !self.config.fields.prevent_title_performer {
            return false;
        }
        let (Some(performer), Some(title)) =
            (fields.text(Field::Performer), fields.text(Field::Title))
        else {
            return false;
        };
        let followed_by_title = tokens.windows(2).any(|pair| {
            pair[0].name == Field::Performer.name() && pair[1].name == Field::Title.name()
        });
        followed_by_title && title.to_lowercase().starts_with(&performer.to_lowercase())
    }

    /// Apply the replace-word rules in order.
    pub fn replace_words(&self, text: &str) -> String {
        let mut text = text.to_string();
        for rule in &self.rules {
            let replaced = match rule {
                CompiledRule::Pattern { regex, replace } => {
                    regex.replace_all(&text, replace.as_str()).into_owned()
                }
                CompiledRule::Any { find, replace } => text.replace(find.as_str(), replace),
            };
            if replaced != text {
                tracing::debug!("Replaced words: {} -> {}", text, replaced);
            }
            text = replaced;
        }
        text
    }

    /// Resolve a filename template (without suffix or extension).
    pub fn resolve_filename(&self, template: &str, fields: &FieldMap) -> String {
        let resolved = self.substitute(template, fields, false);
        let mut text = resolved.text;
        if !self.rules.is_empty() {
            text = self.replace_words(&text);
        }
        let text = self.finish(text, resolved.title.as_deref());
        text.replace(' ', &self.config.filename.splitchar)
    }

    /// Resolve one path segment.
    pub fn resolve_segment(&self, segment: &str, fields: &FieldMap) -> String {
        let resolved = self.substitute(segment, fields, true);
        self.finish(resolved.text, resolved.title.as_deref())
    }

    fn finish(&self, text: String, title: Option<&str>) -> String {
        match title {
            Some(title) => text::cleanup(&text).replace(TITLE_PLACEHOLDER, title),
            None => text::cleanup(&text.replace(TITLE_PLACEHOLDER, "")),
        }
    }
}
