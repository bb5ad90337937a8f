//! Decoding of the Claude CLI `stream-json` output format.
//!
//! Each line is one JSON object discriminated by `type`. [`decode_line`]
//! turns a line into a [`DecodedLine`]; lines that cannot be classified are
//! skipped rather than reported.

mod decode;
mod delta;
mod types;

pub use decode::{DecodeError, DecodeErrorKind, DecodedLine, decode_line, decode_line_at};
pub use delta::{Delta, extract_delta};
pub use types::{
    BlockStart, ContentBlockType, ContentItem, EventKind, EventPayload, InitInfo, MessageEvent,
    RateLimitInfo, ResponseMeta, SessionResult, StreamEvent, Usage,
};

/// Returns the owning delegation id of a raw line, if it names one.
pub fn parent_tool_use_id(raw: &str) -> Option<String> {
    decode_line(raw).and_then(|decoded| decoded.event.parent_tool_use_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_tool_use_id() {
        let cases = [
            (
                r#"{"type":"assistant","parent_tool_use_id":"toolu_123"}"#,
                Some("toolu_123"),
            ),
            (r#"{"type":"assistant","parent_tool_use_id":null}"#, None),
            (r#"{"type":"assistant","parent_tool_use_id":""}"#, None),
            (r#"{"type":"assistant"}"#, None),
            ("garbage", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(parent_tool_use_id(raw).as_deref(), expected, "raw: {raw}");
        }
    }

    #[test]
    fn test_response_meta_merge_keeps_latest() {
        let mut meta = ResponseMeta::default();
        for line in [
            r#"{"type":"assistant","message":{"model":"m1","content":[]}}"#,
            r#"{"type":"assistant","message":{"model":"m2","stop_reason":"end_turn","content":[]}}"#,
            r#"{"type":"user","message":{"content":[]}}"#,
            r#"{"type":"result","result":"done","session_id":"s1"}"#,
        ] {
            let decoded = decode_line(line).unwrap();
            meta.merge(&decoded);
        }
        assert_eq!(meta.model.as_deref(), Some("m2"));
        assert_eq!(meta.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(meta.result.map(|r| r.session_id), Some("s1".to_string()));
    }
}
