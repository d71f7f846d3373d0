//! Three-stage JSON extraction from a model's free-form text response.
//!
//! Models asked for JSON often wrap it in a fenced code block, or pad
//! it with a sentence of commentary either side. Rather than demand a
//! strict grammar, this tries progressively looser strategies and
//! takes the first one that parses.

use serde::de::DeserializeOwned;

use crate::provider::ProviderError;

/// Parse `text` as `T`, trying (in order): a direct parse of the whole
/// string, a fenced ` ```json ` / ` ``` ` code block, then the
/// substring from the first `{` to the last `}`.
pub fn extract<T: DeserializeOwned>(text: &str) -> Result<T, ProviderError> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Ok(value);
    }
    if let Some(block) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str(block.trim()) {
            return Ok(value);
        }
    }
    if let Some(slice) = braces_span(text) {
        if let Ok(value) = serde_json::from_str(slice) {
            return Ok(value);
        }
    }
    Err(ProviderError::InvalidResponse(format!(
        "could not extract JSON from response: {}",
        truncate_for_error(text)
    )))
}

fn fenced_block(text: &str) -> Option<&str> {
    let start_marker_json = "```json";
    let start_marker_plain = "```";
    let start = if let Some(idx) = text.find(start_marker_json) {
        idx + start_marker_json.len()
    } else {
        let idx = text.find(start_marker_plain)?;
        idx + start_marker_plain.len()
    };
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

fn braces_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn truncate_for_error(text: &str) -> String {
    let preview: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        format!("{preview}…")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Candidate {
        name: String,
        score: u32,
    }

    #[test]
    fn direct_parse_succeeds() {
        let out: Candidate = extract(r#"{"name":"a","score":1}"#).unwrap();
        assert_eq!(out, Candidate { name: "a".into(), score: 1 });
    }

    #[test]
    fn fenced_json_block_is_extracted() {
        let text = "Here you go:\n```json\n{\"name\":\"b\",\"score\":2}\n```\nLet me know if that helps.";
        let out: Candidate = extract(text).unwrap();
        assert_eq!(out, Candidate { name: "b".into(), score: 2 });
    }

    #[test]
    fn plain_fenced_block_is_extracted() {
        let text = "```\n{\"name\":\"c\",\"score\":3}\n```";
        let out: Candidate = extract(text).unwrap();
        assert_eq!(out, Candidate { name: "c".into(), score: 3 });
    }

    #[test]
    fn brace_span_fallback_strips_surrounding_prose() {
        let text = "Sure, the answer is {\"name\":\"d\",\"score\":4} — hope that helps!";
        let out: Candidate = extract(text).unwrap();
        assert_eq!(out, Candidate { name: "d".into(), score: 4 });
    }

    #[test]
    fn unparseable_text_fails() {
        let result: Result<Candidate, _> = extract("no json anywhere in this text");
        assert!(result.is_err());
    }
}
