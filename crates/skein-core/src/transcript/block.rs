use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structural kind of a transcript block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Text,
    Reasoning,
    ToolInvocation,
    ToolResult,
}

/// One ordered unit of an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text(TextBlock),
    Reasoning(TextBlock),
    ToolInvocation(ToolInvocation),
    ToolResult(ToolResult),
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Text(_) => BlockKind::Text,
            Block::Reasoning(_) => BlockKind::Reasoning,
            Block::ToolInvocation(_) => BlockKind::ToolInvocation,
            Block::ToolResult(_) => BlockKind::ToolResult,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Block::Text(TextBlock { text: text.into() })
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Block::Reasoning(TextBlock { text: text.into() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextBlock {
    pub text: String,
}

/// A tool call made by the model.
///
/// `input` accumulates raw JSON fragments while streaming and holds the
/// pretty-printed document once the turn is finalized. Calls to a delegation
/// tool carry a [`Delegation`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<Delegation>,
}

impl ToolInvocation {
    pub fn is_delegation(&self) -> bool {
        self.delegation.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub output: String,
    pub is_error: bool,
}

/// A sub-agent run started by a delegation tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Delegation {
    pub description: String,
    pub subagent_type: String,
    pub prompt: String,
    pub sub_blocks: Vec<SubBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<DelegationMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct DelegationInput {
    #[serde(default)]
    description: String,
    #[serde(default)]
    subagent_type: String,
    #[serde(default)]
    prompt: String,
}

impl Delegation {
    /// Whether description and prompt have been filled from the input JSON.
    pub fn has_parsed_input(&self) -> bool {
        !self.description.is_empty() || !self.prompt.is_empty()
    }

    /// Fills description, sub-agent type and prompt from a complete input
    /// document. Input that is not a JSON object leaves the fields unchanged.
    pub fn apply_input(&mut self, input: &str) {
        if let Some(parsed) = parse_delegation_input(input) {
            self.description = parsed.description;
            self.subagent_type = parsed.subagent_type;
            self.prompt = parsed.prompt;
        }
    }
}

fn parse_delegation_input(input: &str) -> Option<DelegationInput> {
    serde_json::from_str(input).ok()
}

/// Summary the CLI attaches to a delegation's own tool result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationMeta {
    #[serde(rename = "agentId", default)]
    pub agent_id: String,
    #[serde(rename = "totalDurationMs", default)]
    pub total_duration_ms: u64,
    #[serde(rename = "totalTokens", default)]
    pub total_tokens: u64,
    #[serde(rename = "totalToolUseCount", default)]
    pub total_tool_use_count: u64,
}

impl DelegationMeta {
    /// Reads the `tool_use_result` side payload. Anything but an object that
    /// matches the expected fields yields `None`.
    pub fn from_tool_use_result(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Self::deserialize(value).ok()
    }
}

/// Activity nested under a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubBlock {
    ToolInvocation {
        id: String,
        name: String,
        input: String,
    },
    ToolResult(ToolResult),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_apply_input_fills_fields() {
        let mut delegation = Delegation::default();
        delegation.apply_input(
            r#"{"description":"Explore codebase","subagent_type":"Explore","prompt":"Find all test files"}"#,
        );
        assert_eq!(delegation.description, "Explore codebase");
        assert_eq!(delegation.subagent_type, "Explore");
        assert_eq!(delegation.prompt, "Find all test files");
        assert!(delegation.has_parsed_input());
    }

    #[test]
    fn test_apply_input_partial_and_invalid() {
        let mut delegation = Delegation::default();
        delegation.apply_input(r#"{"description":"Quick search"}"#);
        assert_eq!(delegation.description, "Quick search");
        assert_eq!(delegation.subagent_type, "");
        assert_eq!(delegation.prompt, "");

        for input in ["", "not json", r#"{"description":"#, "[1]"] {
            let mut delegation = Delegation::default();
            delegation.apply_input(input);
            assert!(!delegation.has_parsed_input(), "input: {input}");
        }
    }

    #[test]
    fn test_apply_input_is_repeatable() {
        let input = r#"{"description":"d","prompt":"p"}"#;
        let mut once = Delegation::default();
        once.apply_input(input);
        let mut twice = once.clone();
        twice.apply_input(input);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_delegation_meta_from_side_payload() {
        let meta = DelegationMeta::from_tool_use_result(&json!({
            "status": "completed",
            "agentId": "a7e2b9c",
            "totalDurationMs": 45000,
            "totalTokens": 12500,
            "totalToolUseCount": 8
        }));
        assert_eq!(
            meta,
            Some(DelegationMeta {
                agent_id: "a7e2b9c".into(),
                total_duration_ms: 45_000,
                total_tokens: 12_500,
                total_tool_use_count: 8,
            })
        );
    }

    #[test]
    fn test_delegation_meta_rejects_non_objects() {
        for value in [json!(null), json!("text"), json!([1, 2]), json!(42)] {
            assert_eq!(DelegationMeta::from_tool_use_result(&value), None);
        }
    }

    #[test]
    fn test_block_serializes_with_type_tag() {
        let block = Block::ToolInvocation(ToolInvocation {
            id: "t1".into(),
            name: "Read".into(),
            input: "{}".into(),
            delegation: None,
        });
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_invocation");
        assert_eq!(value["name"], "Read");
        assert!(value.get("delegation").is_none());
    }
}
