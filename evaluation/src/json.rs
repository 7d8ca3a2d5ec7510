//! Helpers for parsing model-produced JSON.

/// Strip markdown code fences the model sometimes wraps around JSON.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_fenced_json() {
        let fenced = "```json\n{\"title\": \"测评\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"title\": \"测评\"}");
    }

    #[test]
    fn test_plain_json_passes_through() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }
}
