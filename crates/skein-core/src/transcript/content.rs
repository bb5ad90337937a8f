use serde::de::IgnoredAny;
use serde_json::Value;

const INDENT: &str = "  ";

/// Text items beginning with this prefix are CLI bookkeeping appended to a
/// delegation's own result.
pub const AGENT_ID_PREFIX: &str = "agentId:";

/// Flattens a tool result's `content` into display text.
///
/// Strings pass through. Arrays concatenate the `text` of their items, and
/// drop items starting with [`AGENT_ID_PREFIX`] when `strip_agent_id` is set.
/// Anything else is rendered as pretty JSON.
pub fn extract_tool_result_content(content: &Value, strip_agent_id: bool) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .filter(|text| !(strip_agent_id && text.starts_with(AGENT_ID_PREFIX)))
            .collect(),
        other => pretty_value(other),
    }
}

/// Re-indents a JSON document with two spaces. Only whitespace outside
/// strings changes, so number literals keep their exact spelling. Text that
/// is not valid JSON is returned unchanged.
pub fn pretty_json(text: &str) -> String {
    if serde_json::from_str::<IgnoredAny>(text).is_err() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() * 2);
    let mut depth = 0usize;
    let mut chars = text.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                let mut escaped = false;
                for c in chars.by_ref() {
                    out.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    }
                }
            }
            '{' | '[' => {
                let close = if c == '{' { '}' } else { ']' };
                while chars.next_if(char::is_ascii_whitespace).is_some() {}
                out.push(c);
                if chars.next_if_eq(&close).is_some() {
                    out.push(close);
                } else {
                    depth += 1;
                    push_newline(&mut out, depth);
                }
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                push_newline(&mut out, depth);
                out.push(c);
            }
            ',' => {
                out.push(c);
                push_newline(&mut out, depth);
            }
            ':' => out.push_str(": "),
            c if c.is_ascii_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

fn push_newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn pretty_value(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_string_content() {
        assert_eq!(
            extract_tool_result_content(&json!("simple text result"), false),
            "simple text result"
        );
    }

    #[test]
    fn test_array_content_concatenates_text() {
        let content = json!([
            {"type": "text", "text": "First part"},
            {"type": "text", "text": " second part"}
        ]);
        assert_eq!(
            extract_tool_result_content(&content, false),
            "First part second part"
        );
    }

    #[test]
    fn test_agent_id_items() {
        let content = json!([
            {"type": "text", "text": "Result text"},
            {"type": "text", "text": "agentId: abc123"}
        ]);
        assert_eq!(extract_tool_result_content(&content, true), "Result text");
        assert_eq!(
            extract_tool_result_content(&content, false),
            "Result textagentId: abc123"
        );
    }

    #[test]
    fn test_array_items_without_text() {
        let content = json!([{"type": "image"}, "bare", {"type": "text", "text": "ok"}]);
        assert_eq!(extract_tool_result_content(&content, false), "ok");
    }

    #[test]
    fn test_other_content_is_pretty_json() {
        assert_eq!(extract_tool_result_content(&json!(null), false), "null");
        assert_eq!(extract_tool_result_content(&json!(42), false), "42");
        assert_eq!(
            extract_tool_result_content(&json!({"key": "value"}), false),
            "{\n  \"key\": \"value\"\n}"
        );
    }

    #[test]
    fn test_pretty_json() {
        assert_eq!(
            pretty_json(r#"{"file_path":"/tmp/test.go"}"#),
            "{\n  \"file_path\": \"/tmp/test.go\"\n}"
        );
        assert_eq!(
            pretty_json(r#"{"z":1,"a":2}"#),
            "{\n  \"z\": 1,\n  \"a\": 2\n}"
        );
        assert_eq!(pretty_json("{}"), "{}");
        assert_eq!(pretty_json("not json"), "not json");
        assert_eq!(pretty_json(r#"{"partial":"#), r#"{"partial":"#);
    }

    #[test]
    fn test_pretty_json_keeps_number_literals() {
        assert_eq!(
            pretty_json(r#"{"timeout":1.50,"id":123456789012345678901234567890,"exp":1e3}"#),
            "{\n  \"timeout\": 1.50,\n  \"id\": 123456789012345678901234567890,\n  \"exp\": 1e3\n}"
        );
    }

    #[test]
    fn test_pretty_json_nesting_and_strings() {
        assert_eq!(
            pretty_json("{ \"a\" : [1, {}, [ ]], \"s\": \"x, {y}: \\\"z\\\"\" }"),
            "{\n  \"a\": [\n    1,\n    {},\n    []\n  ],\n  \"s\": \"x, {y}: \\\"z\\\"\"\n}"
        );
        assert_eq!(pretty_json("  42 "), "42");
    }

    #[test]
    fn test_pretty_json_is_idempotent() {
        let once = pretty_json(r#"{"a":[1,2,{"b":null}]}"#);
        assert_eq!(pretty_json(&once), once);
    }
}
