//! Typed records decoded from Claude CLI `stream-json` lines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_json::value::RawValue;
use tracing::trace;

use super::delta::Delta;

/// Classification of one decoded line, derived from its `type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Result,
    Assistant,
    User,
    BlockStarted,
    Delta,
    StreamWrapper,
    SystemInit,
    System,
    RateLimit,
    Unknown,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Result => "result",
            EventKind::Assistant => "assistant",
            EventKind::User => "user",
            EventKind::BlockStarted => "block_started",
            EventKind::Delta => "delta",
            EventKind::StreamWrapper => "stream_wrapper",
            EventKind::SystemInit => "system_init",
            EventKind::System => "system",
            EventKind::RateLimit => "rate_limit",
            EventKind::Unknown => "unknown",
        }
    }

    /// Whether this kind only appears when partial messages are enabled.
    pub fn is_partial(self) -> bool {
        matches!(
            self,
            EventKind::BlockStarted | EventKind::Delta | EventKind::StreamWrapper
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded line: its kind-specific payload, the owning delegation (if
/// any), the raw text it came from, and when it was received.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub payload: EventPayload,
    pub parent_tool_use_id: Option<String>,
    pub raw: String,
    pub received_at: DateTime<Utc>,
}

impl StreamEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn owner(&self) -> Option<&str> {
        self.parent_tool_use_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Final session result. The typed record travels on `DecodedLine`.
    Result,
    Assistant(MessageEvent),
    User(MessageEvent),
    BlockStarted(BlockStart),
    /// `None` when the wrapped delta had an unknown type or an empty fragment.
    Delta(Option<Delta>),
    /// A partial-message wrapper that is not a block start or delta
    /// (`message_start`, `message_delta`, `content_block_stop`, ...).
    StreamWrapper {
        event_type: String,
    },
    SystemInit(InitInfo),
    System {
        subtype: Option<String>,
    },
    RateLimit(RateLimitInfo),
    Unknown {
        event_type: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Result => EventKind::Result,
            EventPayload::Assistant(_) => EventKind::Assistant,
            EventPayload::User(_) => EventKind::User,
            EventPayload::BlockStarted(_) => EventKind::BlockStarted,
            EventPayload::Delta(_) => EventKind::Delta,
            EventPayload::StreamWrapper { .. } => EventKind::StreamWrapper,
            EventPayload::SystemInit(_) => EventKind::SystemInit,
            EventPayload::System { .. } => EventKind::System,
            EventPayload::RateLimit(_) => EventKind::RateLimit,
            EventPayload::Unknown { .. } => EventKind::Unknown,
        }
    }
}

/// Content of an `assistant` or `user` message line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageEvent {
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub content: Vec<ContentItem>,
    /// Side payload attached to `user` lines that carry a tool result.
    /// Filled from the top level of the line, not from `message`.
    pub tool_use_result: Option<Value>,
}

/// One entry of a message's `content` array.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// The `input` object exactly as it appeared on the wire. Empty when
        /// absent or null.
        input: String,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },
    Other,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageWire {
    #[serde(default)]
    model: Option<Value>,
    #[serde(default)]
    stop_reason: Option<Value>,
    #[serde(default)]
    content: Option<Box<RawValue>>,
}

impl From<MessageWire> for MessageEvent {
    fn from(wire: MessageWire) -> Self {
        MessageEvent {
            model: wire.model.as_ref().and_then(Value::as_str).map(str::to_string),
            stop_reason: wire
                .stop_reason
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_string),
            content: wire.content.as_deref().map(content_items).unwrap_or_default(),
            tool_use_result: None,
        }
    }
}

/// Message content is either a bare string or an array of typed items.
/// Items are decoded one at a time so a single bad entry only costs itself.
fn content_items(raw: &RawValue) -> Vec<ContentItem> {
    if let Ok(text) = serde_json::from_str::<String>(raw.get()) {
        return vec![ContentItem::Text { text }];
    }
    match serde_json::from_str::<Vec<&RawValue>>(raw.get()) {
        Ok(items) => items.into_iter().map(content_item).collect(),
        Err(_) => Vec::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ContentItemWire {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    thinking: String,
    #[serde(default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default)]
    input: Option<Box<RawValue>>,
    #[serde(default, deserialize_with = "null_as_default")]
    tool_use_id: String,
    #[serde(default)]
    content: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    is_error: bool,
}

fn content_item(raw: &RawValue) -> ContentItem {
    let wire = match serde_json::from_str::<ContentItemWire>(raw.get()) {
        Ok(wire) => wire,
        Err(err) => {
            trace!(error = %err, "content item did not match schema");
            return ContentItem::Other;
        }
    };
    match wire.kind.as_str() {
        "text" => ContentItem::Text { text: wire.text },
        "thinking" => ContentItem::Thinking {
            thinking: wire.thinking,
        },
        "tool_use" => ContentItem::ToolUse {
            id: wire.id,
            name: wire.name,
            input: wire
                .input
                .map(|raw| raw.get().to_string())
                .unwrap_or_default(),
        },
        "tool_result" => ContentItem::ToolResult {
            tool_use_id: wire.tool_use_id,
            content: wire.content,
            is_error: wire.is_error,
        },
        _ => ContentItem::Other,
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Content block kinds announced by a block-start event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentBlockType {
    Text,
    ToolUse,
    Reasoning,
}

impl FromStr for ContentBlockType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentBlockType::Text),
            "tool_use" => Ok(ContentBlockType::ToolUse),
            "thinking" | "reasoning" => Ok(ContentBlockType::Reasoning),
            _ => Err(()),
        }
    }
}

/// A `content_block_start`, either bare or wrapped in a `stream_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStart {
    Text,
    Reasoning,
    ToolUse { id: String, name: String },
    Other { block_type: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ContentBlockWire {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub block_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl From<ContentBlockWire> for BlockStart {
    fn from(wire: ContentBlockWire) -> Self {
        match wire.block_type.parse::<ContentBlockType>() {
            Ok(ContentBlockType::Text) => BlockStart::Text,
            Ok(ContentBlockType::Reasoning) => BlockStart::Reasoning,
            Ok(ContentBlockType::ToolUse) => BlockStart::ToolUse {
                id: wire.id,
                name: wire.name,
            },
            Err(()) => BlockStart::Other {
                block_type: wire.block_type,
            },
        }
    }
}

/// Token accounting reported with a session result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    /// Input tokens including both cache buckets.
    pub fn total_input(&self) -> u64 {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }
}

/// The `result` line that closes a CLI run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionResult {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtype: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_error: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration_ms: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration_api_ms: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub num_turns: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cost_usd: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub usage: Usage,
}

/// Details from the `system`/`init` line the CLI emits before anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitInfo {
    pub session_id: String,
    pub model: String,
    pub version: String,
    pub permission_mode: String,
    pub tools: Vec<String>,
    pub plugins: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InitWire {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    model: String,
    #[serde(rename = "claude_code_version", default)]
    version: String,
    #[serde(rename = "permissionMode", default)]
    permission_mode: String,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    plugins: Vec<PluginWire>,
}

#[derive(Debug, Default, Deserialize)]
struct PluginWire {
    #[serde(default)]
    name: String,
}

impl From<InitWire> for InitInfo {
    fn from(wire: InitWire) -> Self {
        InitInfo {
            session_id: wire.session_id,
            model: wire.model,
            version: wire.version,
            permission_mode: wire.permission_mode,
            tools: wire.tools,
            plugins: wire.plugins.into_iter().map(|p| p.name).collect(),
        }
    }
}

/// Rate-limit status reported by `rate_limit_event` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub status: String,
    pub resets_at: Option<DateTime<Utc>>,
    pub overage_status: String,
    pub is_using_overage: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitWire {
    #[serde(default)]
    status: String,
    #[serde(rename = "resetsAt", default)]
    resets_at: Option<i64>,
    #[serde(rename = "overageStatus", default)]
    overage_status: String,
    #[serde(rename = "isUsingOverage", default)]
    is_using_overage: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RateLimitEnvelope {
    #[serde(default)]
    rate_limit_info: RateLimitWire,
}

impl From<RateLimitEnvelope> for RateLimitInfo {
    fn from(envelope: RateLimitEnvelope) -> Self {
        let wire = envelope.rate_limit_info;
        RateLimitInfo {
            status: wire.status,
            resets_at: wire
                .resets_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            overage_status: wire.overage_status,
            is_using_overage: wire.is_using_overage,
        }
    }
}

/// Response-level metadata accumulated across the lines of one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub result: Option<SessionResult>,
}

impl ResponseMeta {
    /// Folds one decoded line into the metadata. Later values win.
    pub fn merge(&mut self, line: &super::DecodedLine) {
        if let Some(model) = &line.model {
            self.model = Some(model.clone());
        }
        if let Some(stop_reason) = &line.stop_reason {
            self.stop_reason = Some(stop_reason.clone());
        }
        if let Some(result) = &line.result {
            self.result = Some(result.clone());
        }
    }
}
