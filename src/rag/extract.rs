//! Structured-output extraction from generation responses.
//!
//! Providers are not guaranteed to emit output free of surrounding text, so
//! the response runs through an ordered list of fallback strategies:
//! 1. strip a leading/trailing code fence, accept if the remainder opens a
//!    JSON object
//! 2. otherwise take the first-to-last brace span of the raw text

/// Extract the JSON object carried in `raw`, if any.
#[must_use]
pub fn extract_json_object(raw: &str) -> Option<String> {
    let cleaned = strip_code_fence(raw);
    if cleaned.starts_with('{') {
        return Some(cleaned);
    }
    brace_span(raw)
}

/// Remove one surrounding ``` fence, keeping whatever it wrapped.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = match inner.rfind("```") {
        Some(pos) => &inner[..pos],
        None => inner,
    };
    inner.trim().to_string()
}

/// First '{' through last '}' of the raw text.
fn brace_span(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object_passes_through() {
        assert_eq!(
            extract_json_object(r#"{"products": []}"#).unwrap(),
            r#"{"products": []}"#
        );
    }

    #[test]
    fn test_fenced_object_is_unwrapped() {
        let raw = "```\n{\"products\": []}\n```";
        assert_eq!(extract_json_object(raw).unwrap(), "{\"products\": []}");
    }

    #[test]
    fn test_fence_with_language_tag_falls_back_to_brace_span() {
        let raw = "```json\n{\"products\": []}\n```";
        assert_eq!(extract_json_object(raw).unwrap(), "{\"products\": []}");
    }

    #[test]
    fn test_surrounding_prose_is_dropped() {
        let raw = "Sure, here is the result: {\"products\": []} Hope that helps!";
        assert_eq!(extract_json_object(raw).unwrap(), "{\"products\": []}");
    }

    #[test]
    fn test_no_object_yields_none() {
        assert!(extract_json_object("no structure here").is_none());
        assert!(extract_json_object("").is_none());
    }
}
