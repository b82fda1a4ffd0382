//! Recovery of JSON objects from free-form model output.

use serde_json::Value;

/// Strips stray backticks, quotes and spaces from both ends of `text` and
/// parses what is left.
///
/// Returns `None` if the remainder is still not valid JSON.
pub fn repair_json(text: &str) -> Option<Value> {
    let trimmed = text.trim_matches(|c| matches!(c, '`' | ' ' | '\'' | '"'));
    serde_json::from_str(trimmed).ok()
}

/// Returns the first double-quoted string in `prompt`.
///
/// Quotes never pair across a line break.
pub fn extract_title(prompt: &str) -> Option<&str> {
    prompt.lines().find_map(|line| {
        let (_, rest) = line.split_once('"')?;
        let (title, _) = rest.split_once('"')?;
        Some(title)
    })
}
