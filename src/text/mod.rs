//! Shared text helpers: token estimates, JSON text coercion, cleaning and paths

pub mod cleaner;
pub mod paths;

use serde_json::Value;

pub use cleaner::Cleaner;

const CHARS_PER_TOKEN: usize = 4;

/// Character-based token estimate: chars / 4, at least 1 for non-empty text
pub fn estimate_tokens(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() / CHARS_PER_TOKEN).max(1) as i64
}

/// Flatten nested JSON text (strings, arrays, `{text|value|content}` objects) into one string
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| coerce_text(item).trim().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => {
            for key in ["text", "value", "content"] {
                if let Some(inner) = map.get(key) {
                    let text = coerce_text(inner).trim().to_string();
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
            String::new()
        }
        other => other.to_string(),
    }
}

/// First `n` characters of `text`
pub fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("hi"), 1);
        assert_eq!(estimate_tokens("12345678"), 2);
    }

    #[test]
    fn test_coerce_text_shapes() {
        assert_eq!(coerce_text(&json!("hello")), "hello");
        assert_eq!(coerce_text(&json!(["a ", "", " b"])), "a\nb");
        assert_eq!(coerce_text(&json!({"value": "v"})), "v");
        assert_eq!(coerce_text(&json!({"text": "", "content": "c"})), "c");
        assert_eq!(coerce_text(&json!(null)), "");
        assert_eq!(coerce_text(&json!(42)), "42");
    }
}
