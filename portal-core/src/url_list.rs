//! Reference URL lists and their serialized forms.
//!
//! In memory a URL list is always a `Vec<String>`. Stores hand them back as a
//! single string: either a JSON array (`["a","b"]`, how this workspace writes
//! them) or a Postgres array literal (`{a,b}`). Both are accepted here.

use serde_json::Value;

/// Normalize a JSON value into a list of URLs.
///
/// Arrays keep their string elements; strings are parsed with
/// [`parse_url_list_str`]; anything else yields an empty list.
pub fn parse_url_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) => parse_url_list_str(s),
        _ => Vec::new(),
    }
}

/// Parse a serialized URL list.
///
/// Only a JSON array or a `{...}` array literal is a list; anything else,
/// including an unterminated literal, yields an empty list.
///
/// ```
/// use portal_core::url_list::parse_url_list_str;
///
/// assert_eq!(parse_url_list_str("{a,b}"), vec!["a", "b"]);
/// assert_eq!(parse_url_list_str(r#"["a","b"]"#), vec!["a", "b"]);
/// assert!(parse_url_list_str("{}").is_empty());
/// assert!(parse_url_list_str("a,b").is_empty());
/// ```
pub fn parse_url_list_str(s: &str) -> Vec<String> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }

    if s.starts_with('[') {
        if let Ok(value @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
            return parse_url_list(&value);
        }
    } else if let Some(inner) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        return split_array_literal(inner);
    }

    log::debug!(
        "Unparseable URL list: {}",
        s.chars().take(80).collect::<String>()
    );
    Vec::new()
}

/// Split the body of a `{...}` literal on commas outside double quotes.
fn split_array_literal(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Serialize a URL list for a text column.
pub fn encode_url_list(urls: &[String]) -> String {
    Value::from(urls.to_vec()).to_string()
}
