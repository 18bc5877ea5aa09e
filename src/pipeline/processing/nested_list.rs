//! Flattening of list-valued columns.
//!
//! The raw datasets store genres and cast as serialized lists of objects, e.g.
//! `[{"id": 28, "name": "Action"}, {"id": 12, "name": "Adventure"}]`. Some
//! exports use Python literal quoting (`'name': 'Action'`) instead of JSON.
//! Both are reduced to the `name` values in source order joined by
//! [`LIST_DELIMITER`]. A value that is not a serialized list is treated as an
//! already-flat delimited list.

use crate::constants::LIST_DELIMITER;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"['"]name['"]\s*:\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')"#)
            .expect("name pattern is a valid regex")
    })
}

/// Extract names from a list-valued field, keeping at most `limit` of them.
///
/// Returns `None` for blank input, unparseable structures and empty lists.
pub fn flatten_names(raw: &str, limit: Option<usize>) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let names = if trimmed.starts_with('[') {
        structured_names(trimmed)
    } else {
        trimmed
            .split(LIST_DELIMITER)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    let take = limit.unwrap_or(usize::MAX);
    let kept: Vec<String> = names.into_iter().take(take).collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(LIST_DELIMITER))
    }
}

/// Split a flattened field back into its tags
pub fn split_tags(flat: &str) -> impl Iterator<Item = &str> {
    flat.split(LIST_DELIMITER)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn structured_names(text: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<Value>>(text) {
        Ok(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => map.get("name").and_then(|n| n.as_str()),
                Value::String(s) => Some(s.as_str()),
                _ => None,
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        // Python-literal quoting, or JSON broken by the export
        Err(_) => name_pattern()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| unescape(m.as_str()))
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_list_of_objects() {
        let raw = r#"[{"id": 28, "name": "Action"}, {"id": 12, "name": "Adventure"},
                      {"id": 14, "name": "Fantasy"}]"#;
        assert_eq!(flatten_names(raw, None).as_deref(), Some("Action,Adventure,Fantasy"));
    }

    #[test]
    fn test_cast_is_truncated_in_source_order() {
        let raw = r#"[{"cast_id": 242, "name": "Sam Worthington", "order": 0},
                      {"cast_id": 3, "name": "Zoe Saldana", "order": 1},
                      {"cast_id": 25, "name": "Sigourney Weaver", "order": 2},
                      {"cast_id": 4, "name": "Stephen Lang", "order": 3}]"#;
        assert_eq!(
            flatten_names(raw, Some(3)).as_deref(),
            Some("Sam Worthington,Zoe Saldana,Sigourney Weaver")
        );
    }

    #[test]
    fn test_python_literal_quoting() {
        let raw = "[{'id': 18, 'name': 'Drama'}, {'id': 35, 'name': 'Comedy'}]";
        assert_eq!(flatten_names(raw, None).as_deref(), Some("Drama,Comedy"));
    }

    #[test]
    fn test_flat_text_is_already_a_list() {
        assert_eq!(flatten_names("Action, Drama", None).as_deref(), Some("Action,Drama"));
        assert_eq!(flatten_names("A,B,C,D", Some(3)).as_deref(), Some("A,B,C"));
    }

    #[test]
    fn test_empty_inputs_are_null() {
        assert_eq!(flatten_names("", None), None);
        assert_eq!(flatten_names("[]", None), None);
        assert_eq!(flatten_names("[{\"id\": 1}]", None), None);
        assert_eq!(flatten_names("[not a list", None), None);
    }

    #[test]
    fn test_split_tags_skips_blanks() {
        let tags: Vec<&str> = split_tags(" Action, ,Drama ,").collect();
        assert_eq!(tags, vec!["Action", "Drama"]);
    }
}
