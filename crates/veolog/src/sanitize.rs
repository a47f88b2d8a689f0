//! Keeping request payloads short and free of secrets before they are logged.
//!
//! Video prompts can run to several paragraphs and image URLs embed long
//! storage paths, so `[POST DATA]` lines log a trimmed copy of the body.

use serde_json::{Map, Value};

/// Prompts longer than this are cut before logging.
pub const PROMPT_LIMIT: usize = 100;

/// User agents longer than this are cut in `[REQUEST]` lines.
pub const USER_AGENT_LIMIT: usize = 50;

/// Number of characters of an id kept by [`short_id`].
pub const SHORT_ID_LEN: usize = 8;

/// Replacement for credential values.
pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values are never logged.
const SECRET_KEYS: [&str; 8] = [
    "api_key",
    "apikey",
    "password",
    "secret",
    "token",
    "access_token",
    "account_key",
    "authorization",
];

/// Keep at most `limit` characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Keep at most `limit` characters, appending `...` when something was cut.
#[must_use]
pub fn ellipsize(text: &str, limit: usize) -> String {
    let kept = truncate_chars(text, limit);
    if kept.len() < text.len() {
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

/// First eight characters of a task or deck id followed by `...`.
///
/// ```
/// assert_eq!(veolog::sanitize::short_id("3f2a9c71-5be0-4d7e"), "3f2a9c71...");
/// ```
#[must_use]
pub fn short_id(id: &str) -> String {
    format!("{}...", truncate_chars(id, SHORT_ID_LEN))
}

/// The last path segment of a URL, or the value itself when it has none.
#[must_use]
pub fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_KEYS.iter().any(|secret| key == *secret)
}

/// Produce the loggable copy of a JSON request body.
///
/// Only top-level object keys are rewritten:
/// - `prompt` strings are cut to [`PROMPT_LIMIT`] characters plus `...`
/// - `image_url` strings are reduced to their file name
/// - credential keys are replaced by [`REDACTED`]
#[must_use]
pub fn sanitize_post_data(body: &Value) -> Value {
    let Value::Object(fields) = body else {
        return body.clone();
    };

    let sanitized: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                (k, _) if is_secret_key(k) => Value::String(REDACTED.to_string()),
                ("prompt", Value::String(prompt)) => Value::String(ellipsize(prompt, PROMPT_LIMIT)),
                ("image_url", Value::String(url)) => Value::String(last_segment(url).to_string()),
                _ => value.clone(),
            };
            (key.clone(), value)
        })
        .collect();

    Value::Object(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("abcdef", 3), "abc...");
        assert_eq!(ellipsize("abc", 3), "abc");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567...");
        assert_eq!(short_id("abc"), "abc...");
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(
            last_segment("https://acct.blob.core.windows.net/c/input_images/cat.png"),
            "cat.png"
        );
        assert_eq!(last_segment("cat.png"), "cat.png");
        assert_eq!(last_segment("https://host/dir/"), "");
    }

    #[test]
    fn test_sanitize_long_prompt() {
        let prompt = "a".repeat(150);
        let body = json!({ "prompt": prompt, "model": "veo3_fast" });

        let sanitized = sanitize_post_data(&body);
        let kept = sanitized["prompt"].as_str().unwrap();
        assert_eq!(kept.len(), 103);
        assert!(kept.ends_with("..."));
        assert_eq!(sanitized["model"], "veo3_fast");
    }

    #[test]
    fn test_sanitize_short_prompt_untouched() {
        let body = json!({ "prompt": "A cat surfing at sunset" });
        assert_eq!(sanitize_post_data(&body), body);
    }

    #[test]
    fn test_sanitize_prompt_of_exact_limit() {
        let prompt = "b".repeat(PROMPT_LIMIT);
        let body = json!({ "prompt": prompt });
        assert_eq!(sanitize_post_data(&body), body);
    }

    #[test]
    fn test_sanitize_image_url() {
        let body = json!({
            "image_url": "https://acct.blob.core.windows.net/unai-public/veo/input_images/20260116_abc.png"
        });
        assert_eq!(
            sanitize_post_data(&body),
            json!({ "image_url": "20260116_abc.png" })
        );
    }

    #[test]
    fn test_sanitize_redacts_secrets() {
        let body = json!({ "API_KEY": "sk-123", "token": 42, "name": "deck" });
        let sanitized = sanitize_post_data(&body);
        assert_eq!(sanitized["API_KEY"], REDACTED);
        assert_eq!(sanitized["token"], REDACTED);
        assert_eq!(sanitized["name"], "deck");
    }

    #[test]
    fn test_sanitize_non_string_values_kept() {
        let body = json!({ "prompt": 5, "image_url": null, "cards": [1, 2] });
        assert_eq!(sanitize_post_data(&body), body);
    }

    #[test]
    fn test_sanitize_non_object() {
        let body = json!(["prompt", "x"]);
        assert_eq!(sanitize_post_data(&body), body);
    }
}
