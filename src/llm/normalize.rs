//! Response cleanup: code-fence stripping and structured-output parsing.

use super::LlmError;

/// Maximum characters of raw model output carried in a diagnostic.
const SNIPPET_LIMIT: usize = 1000;

/// Strip a markdown code fence wrapping the payload, if present.
///
/// Handles the common provider habit of answering
/// ```` ```json\n{...}\n``` ```` even when told not to. Input without a
/// leading fence passes through unchanged, so the function is idempotent.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return raw;
    }
    let inner = match trimmed.strip_prefix("```json") {
        Some(rest) => rest,
        None => &trimmed[3..],
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse cleaned model output as a JSON value.
///
/// On failure the diagnostic carries a bounded prefix of the raw text —
/// never the full payload, which can be arbitrarily large.
pub fn parse_structured(raw: &str) -> Result<serde_json::Value, LlmError> {
    let cleaned = strip_code_fence(raw);
    serde_json::from_str(cleaned).map_err(|_| LlmError::MalformedOutput {
        snippet: bounded_snippet(raw),
    })
}

/// Char-boundary-safe prefix of at most [`SNIPPET_LIMIT`] characters.
pub fn bounded_snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tagged_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_untagged_fence() {
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn clean_payload_passes_through_unchanged() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn stripping_is_idempotent() {
        let once = strip_code_fence("```json\n{\"a\":1}\n```");
        assert_eq!(strip_code_fence(once), once);
    }

    #[test]
    fn unclosed_fence_still_strips_the_opening() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parse_structured_accepts_fenced_json() {
        let value = parse_structured("```json\n{\"urgency_level\": \"NORMAL\"}\n```").unwrap();
        assert_eq!(value["urgency_level"], "NORMAL");
    }

    #[test]
    fn parse_structured_accepts_bare_json() {
        let value = parse_structured("{\"a\": [1, 2, 3]}").unwrap();
        assert_eq!(value["a"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn parse_failure_carries_bounded_snippet() {
        let garbage = "not json at all ".repeat(200); // ~3200 chars
        let err = parse_structured(&garbage).unwrap_err();
        match err {
            LlmError::MalformedOutput { snippet } => {
                assert_eq!(snippet.chars().count(), 1000);
                assert!(garbage.starts_with(&snippet));
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn snippet_is_char_boundary_safe() {
        let garbage = "é".repeat(1500);
        let err = parse_structured(&garbage).unwrap_err();
        match err {
            LlmError::MalformedOutput { snippet } => {
                assert_eq!(snippet.chars().count(), 1000);
            }
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }

    #[test]
    fn short_garbage_kept_whole() {
        let err = parse_structured("oops").unwrap_err();
        match err {
            LlmError::MalformedOutput { snippet } => assert_eq!(snippet, "oops"),
            other => panic!("expected MalformedOutput, got {other:?}"),
        }
    }
}
