//! Text cleanup helpers shared by filename and folder generation.

use regex::Regex;
use std::sync::OnceLock;

/// Characters that are illegal in a path component on common filesystems.
pub const ILLEGAL_CHARACTERS: &[char] = &['\\', '/', ':', '"', '*', '?', '<', '>', '|'];

/// Passes of the repeated punctuation collapse.
const COLLAPSE_PASSES: usize = 10;

fn empty_groups_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\W*\)|\[\W*\]|\{[^a-zA-Z0-9]*\}").expect("static regex is valid")
    })
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]+('[A-Za-z]+)?").expect("static regex is valid"))
}

/// Remove characters illegal in a path component.
pub fn strip_illegal(s: &str) -> String {
    s.chars().filter(|c| !ILLEGAL_CHARACTERS.contains(c)).collect()
}

/// Remove every character that appears in `set`.
pub fn remove_characters(s: &str, set: &str) -> String {
    if set.is_empty() {
        return s.to_string();
    }
    s.chars().filter(|c| !set.contains(*c)).collect()
}

/// Replace typographic quotes with a typewriter apostrophe.
pub fn normalize_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if matches!(c, '’' | '‘' | '”' | '“') {
            if !in_run {
                out.push('\'');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Capitalize every word, keeping contractions like "Don't" intact.
pub fn capitalize_words(s: &str) -> String {
    word_regex()
        .replace_all(s, |caps: &regex::Captures| {
            let word = &caps[0];
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .into_owned()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Collapse one run of non-word characters: any unit repeated back to back
/// is kept once, preferring the longest unit at each position.
fn collapse_run(run: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(run.len());
    let mut i = 0;
    while i < run.len() {
        let remaining = run.len() - i;
        let mut matched = false;
        for unit in (1..=remaining / 2).rev() {
            if run[i..i + unit] != run[i + unit..i + 2 * unit] {
                continue;
            }
            let mut end = i + 2 * unit;
            while end + unit <= run.len() && run[end..end + unit] == run[i..i + unit] {
                end += unit;
            }
            out.extend_from_slice(&run[i..i + unit]);
            i = end;
            matched = true;
            break;
        }
        if !matched {
            out.push(run[i]);
            i += 1;
        }
    }
    out
}

/// One pass over the text collapsing repeated punctuation.
fn collapse_pass(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if is_word_char(chars[i]) {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && !is_word_char(chars[i]) {
            i += 1;
        }
        out.extend(collapse_run(&chars[start..i]));
    }
    out
}

/// Collapse runs of repeated non-word characters ("--" → "-", " - - " → " - ").
pub fn collapse_repeated_nonword(s: &str) -> String {
    let mut text = s.to_string();
    for _ in 0..COLLAPSE_PASSES {
        let next = collapse_pass(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text
}

/// Remove empty bracket groups, stray braces and repeated punctuation, then
/// trim separators from both ends.
pub fn cleanup(s: &str) -> String {
    let text = empty_groups_regex().replace_all(s, "");
    let text: String = text.chars().filter(|c| *c != '{' && *c != '}').collect();
    let text = collapse_repeated_nonword(&text);
    text.trim_matches(|c| matches!(c, ' ' | '-' | '_' | '.'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_illegal() {
        assert_eq!(strip_illegal(r#"a/b\c:d"e*f?g<h>i|j"#), "abcdefghij");
    }

    #[test]
    fn test_normalize_quotes() {
        assert_eq!(normalize_quotes("Don’t “Stop”"), "Don't 'Stop'");
        assert_eq!(normalize_quotes("a’’b"), "a'b");
    }

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize_words("don't STOP me now"), "Don't Stop Me Now");
        assert_eq!(capitalize_words("2021 beach-day"), "2021 Beach-Day");
    }

    #[test]
    fn test_collapse_repeated_nonword() {
        assert_eq!(collapse_repeated_nonword("a--b"), "a-b");
        assert_eq!(collapse_repeated_nonword("a - - b"), "a - b");
        assert_eq!(collapse_repeated_nonword("a  b"), "a b");
        assert_eq!(collapse_repeated_nonword("a - b"), "a - b");
    }

    #[test]
    fn test_cleanup() {
        assert_eq!(cleanup("2021-06-03 -  - Beach Day ()"), "2021-06-03 - Beach Day");
        assert_eq!(cleanup("[Studio] [] Title"), "[Studio] Title");
        assert_eq!(cleanup("{ } - Title -"), "Title");
        assert_eq!(cleanup("_Title."), "Title");
    }
}
