//! Pull a JSON object out of free-form model output.

use serde_json::Value;

/// Slice from the first `{` to the last `}`, or `None` if there is no object
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the object a response carries, with a readable error for feedback
pub fn parse_response(text: &str) -> Result<Value, String> {
    let Some(json) = extract_json(text) else {
        return Err("response contains no JSON object".to_string());
    };
    serde_json::from_str(json).map_err(|e| format!("response is not valid JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_prose() {
        let text = "Sure! Here is my ruling:\n```json\n{\"score\": 4, \"argument\": \"ok\"}\n```\nThanks.";
        assert_eq!(extract_json(text), Some("{\"score\": 4, \"argument\": \"ok\"}"));
    }

    #[test]
    fn test_nested_objects_kept_whole() {
        let text = r#"{"claims": [{"present": true}], "score": 3}"#;
        let value = parse_response(text).unwrap();
        assert_eq!(value["score"], 3);
    }

    #[test]
    fn test_no_object() {
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
        assert!(parse_response("score: 4").unwrap_err().contains("no JSON object"));
    }

    #[test]
    fn test_truncated_object() {
        let err = parse_response("{\"score\": 4, \"argument\": }").unwrap_err();
        assert!(err.starts_with("response is not valid JSON"));
    }
}
