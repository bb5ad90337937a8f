use serde::Deserialize;

/// A single incremental fragment carried by a `content_block_delta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Text(String),
    Thinking(String),
    InputJson(String),
}

impl Delta {
    pub fn fragment(&self) -> &str {
        match self {
            Delta::Text(s) | Delta::Thinking(s) | Delta::InputJson(s) => s,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WrapperWire {
    #[serde(default)]
    pub event: InnerEventWire,
}

/// The `event` object inside a `stream_event` line.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct InnerEventWire {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub content_block: Option<super::types::ContentBlockWire>,
    #[serde(default)]
    pub delta: Option<DeltaWire>,
    #[serde(default)]
    pub message: Option<MessageStartWire>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeltaWire {
    #[serde(rename = "type", default)]
    pub delta_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub partial_json: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageStartWire {
    #[serde(default)]
    pub model: Option<String>,
}

impl InnerEventWire {
    pub(crate) fn delta(&self) -> Option<Delta> {
        if self.event_type != "content_block_delta" {
            return None;
        }
        let wire = self.delta.as_ref()?;
        let delta = match wire.delta_type.as_str() {
            "text_delta" => Delta::Text(wire.text.clone()?),
            "thinking_delta" => Delta::Thinking(wire.thinking.clone()?),
            "input_json_delta" => Delta::InputJson(wire.partial_json.clone()?),
            _ => return None,
        };
        (!delta.fragment().is_empty()).then_some(delta)
    }
}

/// Pulls the delta fragment out of a raw `stream_event` line.
///
/// Returns `None` for lines that are not JSON, wrappers around anything other
/// than `content_block_delta`, unknown delta types, and empty fragments.
pub fn extract_delta(raw: &str) -> Option<Delta> {
    let wrapper: WrapperWire = serde_json::from_str(raw).ok()?;
    wrapper.event.delta()
}
