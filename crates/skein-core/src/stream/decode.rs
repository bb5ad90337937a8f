use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::delta::WrapperWire;
use super::types::{
    ContentBlockWire, EventPayload, InitInfo, InitWire, MessageEvent, MessageWire,
    RateLimitEnvelope, RateLimitInfo, SessionResult, StreamEvent,
};

/// Kinds of per-line decode failure that still produce an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// A `result` line whose body did not match the result schema.
    MalformedResult,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::MalformedResult => write!(f, "malformed_result"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub message: String,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DecodeError {}

/// Everything extracted from one line.
///
/// `model`, `stop_reason` and `result` are response-level facts the line
/// carried, for folding into a [`super::ResponseMeta`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLine {
    pub event: StreamEvent,
    pub result: Option<SessionResult>,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub error: Option<DecodeError>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    parent_tool_use_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Option<MessageWire>,
    #[serde(default)]
    tool_use_result: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct BlockStartEnvelope {
    #[serde(default)]
    content_block: Option<ContentBlockWire>,
}

/// Decodes one line, stamping it with the current time.
pub fn decode_line(line: &str) -> Option<DecodedLine> {
    decode_line_at(line, Utc::now())
}

/// Decodes one line of `stream-json` output.
///
/// Returns `None` for empty lines, lines that are not a JSON object, and
/// objects without a string `type`. Every other line produces an event; a
/// malformed `result` body is reported through [`DecodedLine::error`].
pub fn decode_line_at(line: &str, received_at: DateTime<Utc>) -> Option<DecodedLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(err) => {
            trace!(error = %err, "skipping undecodable line");
            return None;
        }
    };
    let envelope = match Envelope::deserialize(&value) {
        Ok(envelope) => envelope,
        Err(err) => {
            trace!(error = %err, "skipping line without a type");
            return None;
        }
    };

    let mut decoded = DecodedLine {
        event: StreamEvent {
            payload: EventPayload::Unknown {
                event_type: String::new(),
            },
            parent_tool_use_id: envelope.parent_tool_use_id.filter(|id| !id.is_empty()),
            raw: line.to_string(),
            received_at,
        },
        result: None,
        model: None,
        stop_reason: None,
        error: None,
    };

    decoded.event.payload = match envelope.event_type.as_str() {
        "result" => {
            match SessionResult::deserialize(&value) {
                Ok(result) => decoded.result = Some(result),
                Err(err) => {
                    warn!(error = %err, "malformed result line");
                    decoded.error = Some(DecodeError::new(
                        DecodeErrorKind::MalformedResult,
                        err.to_string(),
                    ));
                }
            }
            EventPayload::Result
        }
        "assistant" => {
            let message = message_event(trimmed);
            decoded.model = message.model.clone().filter(|m| !m.is_empty());
            decoded.stop_reason = message.stop_reason.clone().filter(|r| !r.is_empty());
            EventPayload::Assistant(message)
        }
        "user" => EventPayload::User(message_event(trimmed)),
        "content_block_start" => {
            let envelope = BlockStartEnvelope::deserialize(&value).unwrap_or_default();
            EventPayload::BlockStarted(envelope.content_block.unwrap_or_default().into())
        }
        "stream_event" => stream_payload(&value, &mut decoded),
        "system" if envelope.subtype.as_deref() == Some("init") => {
            EventPayload::SystemInit(InitInfo::from(
                InitWire::deserialize(&value).unwrap_or_default(),
            ))
        }
        "system" => EventPayload::System {
            subtype: envelope.subtype,
        },
        "rate_limit_event" => EventPayload::RateLimit(RateLimitInfo::from(
            RateLimitEnvelope::deserialize(&value).unwrap_or_default(),
        )),
        other => {
            debug!(event_type = other, "unrecognized stream event type");
            EventPayload::Unknown {
                event_type: other.to_string(),
            }
        }
    };

    Some(decoded)
}

/// Parsed from the line text rather than a `Value` so tool input keeps its
/// exact number literals.
fn message_event(line: &str) -> MessageEvent {
    let envelope = match serde_json::from_str::<MessageEnvelope>(line) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(error = %err, "message content did not match schema");
            MessageEnvelope::default()
        }
    };
    let mut message = MessageEvent::from(envelope.message.unwrap_or_default());
    message.tool_use_result = envelope.tool_use_result.filter(|v| !v.is_null());
    message
}

fn stream_payload(value: &Value, decoded: &mut DecodedLine) -> EventPayload {
    let inner = WrapperWire::deserialize(value).unwrap_or_default().event;
    match inner.event_type.as_str() {
        "content_block_start" => {
            EventPayload::BlockStarted(inner.content_block.unwrap_or_default().into())
        }
        "content_block_delta" => EventPayload::Delta(inner.delta()),
        _ => {
            if let Some(model) = inner.message.as_ref().and_then(|m| m.model.as_ref()) {
                decoded.model = Some(model.clone()).filter(|m| !m.is_empty());
            }
            if let Some(reason) = inner.delta.as_ref().and_then(|d| d.stop_reason.as_ref()) {
                decoded.stop_reason = Some(reason.clone()).filter(|r| !r.is_empty());
            }
            EventPayload::StreamWrapper {
                event_type: inner.event_type,
            }
        }
    }
}
