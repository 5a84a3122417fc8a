use serde_json::Value;

/// Parse a JSON object out of a model reply.
///
/// The whole reply is tried first, then the span between the first `{`
/// and the last `}` (models like to wrap JSON in prose or code fences).
#[must_use]
pub fn parse_json_object(raw: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(value);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_object() {
        assert_eq!(parse_json_object(r#"{"issues": []}"#), Some(json!({"issues": []})));
    }

    #[test]
    fn fenced_object() {
        let raw = "Here you go:\n```json\n{\"issues\": [{\"severity\": \"high\"}]}\n```\n";
        assert_eq!(
            parse_json_object(raw),
            Some(json!({"issues": [{"severity": "high"}]}))
        );
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert_eq!(parse_json_object("[1, 2]"), None);
        assert_eq!(parse_json_object("no json here"), None);
        assert_eq!(parse_json_object("} {"), None);
        assert_eq!(parse_json_object("{ broken"), None);
    }
}
