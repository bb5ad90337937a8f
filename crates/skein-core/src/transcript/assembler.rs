use tracing::{debug, trace};

use super::block::{
    Block, Delegation, DelegationMeta, SubBlock, TextBlock, ToolInvocation, ToolResult,
};
use super::content::{extract_tool_result_content, pretty_json};
use super::turn::Turn;
use crate::stream::{BlockStart, ContentItem, Delta, EventPayload, MessageEvent, StreamEvent};

/// Tool name the CLI uses to start a sub-agent.
pub const DEFAULT_DELEGATION_TOOL: &str = "Task";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Tool names whose invocations are treated as delegations.
    pub delegation_tools: Vec<String>,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            delegation_tools: vec![DEFAULT_DELEGATION_TOOL.to_string()],
        }
    }
}

/// Applies stream events to a [`Turn`].
///
/// The assembler holds no per-turn state; everything it builds lives in the
/// turn, so one assembler can serve a whole session.
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    options: AssemblerOptions,
}

impl Assembler {
    pub fn new(options: AssemblerOptions) -> Self {
        Self { options }
    }

    fn is_delegation_tool(&self, name: &str) -> bool {
        self.options.delegation_tools.iter().any(|tool| tool == name)
    }

    fn new_invocation(&self, id: &str, name: &str, input: String) -> ToolInvocation {
        ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            input,
            delegation: self.is_delegation_tool(name).then(Delegation::default),
        }
    }

    /// Applies one event to a streaming turn.
    ///
    /// Events naming an owner are routed into that delegation or dropped;
    /// they never touch the top level. Finalized turns are left untouched.
    pub fn route(&self, turn: &mut Turn, event: &StreamEvent) {
        if !turn.streaming {
            trace!(kind = %event.kind(), "ignoring event for finalized turn");
            return;
        }

        if let Some(owner) = event.owner() {
            self.route_to_delegation(turn, owner, event);
            return;
        }

        if event.kind().is_partial() {
            turn.saw_partial = true;
        }

        match &event.payload {
            EventPayload::BlockStarted(start) => self.open_block(turn, start),
            EventPayload::Delta(Some(delta)) => apply_delta(turn, delta),
            EventPayload::User(message) => apply_tool_results(turn, message),
            EventPayload::Assistant(message) => {
                if !turn.saw_partial {
                    self.apply_snapshot(turn, message);
                }
            }
            EventPayload::Delta(None)
            | EventPayload::StreamWrapper { .. }
            | EventPayload::Result
            | EventPayload::SystemInit(_)
            | EventPayload::System { .. }
            | EventPayload::RateLimit(_)
            | EventPayload::Unknown { .. } => {}
        }
    }

    fn route_to_delegation(&self, turn: &mut Turn, owner: &str, event: &StreamEvent) {
        let Some(ToolInvocation {
            input,
            delegation: Some(delegation),
            ..
        }) = turn.registry.delegation_mut(owner)
        else {
            debug!(owner, kind = %event.kind(), "dropping event for unknown delegation");
            return;
        };

        if !delegation.has_parsed_input() && !input.is_empty() {
            delegation.apply_input(input);
        }

        match &event.payload {
            EventPayload::Assistant(message) => {
                for item in &message.content {
                    if let ContentItem::ToolUse { id, name, input } = item {
                        let input = if input.is_empty() {
                            "{}".to_string()
                        } else {
                            pretty_json(input)
                        };
                        delegation.sub_blocks.push(SubBlock::ToolInvocation {
                            id: id.clone(),
                            name: name.clone(),
                            input,
                        });
                    }
                }
            }
            EventPayload::User(message) => {
                for item in &message.content {
                    if let ContentItem::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } = item
                    {
                        delegation.sub_blocks.push(SubBlock::ToolResult(ToolResult {
                            tool_use_id: tool_use_id.clone(),
                            output: extract_tool_result_content(content, false),
                            is_error: *is_error,
                        }));
                    }
                }
            }
            _ => trace!(owner, kind = %event.kind(), "no sub-block for delegated event"),
        }
    }

    fn open_block(&self, turn: &mut Turn, start: &BlockStart) {
        match start {
            BlockStart::Text => turn.registry.push(Block::Text(TextBlock::default())),
            BlockStart::Reasoning => turn.registry.push(Block::Reasoning(TextBlock::default())),
            BlockStart::ToolUse { id, name } => {
                let invocation = self.new_invocation(id, name, String::new());
                turn.registry.push(Block::ToolInvocation(invocation));
            }
            BlockStart::Other { block_type } => {
                debug!(block_type, "ignoring block start of unsupported type");
            }
        }
    }

    /// Adds the content of a whole assistant message. Only used until the
    /// first partial event, since partial events already carry the same content.
    fn apply_snapshot(&self, turn: &mut Turn, message: &MessageEvent) {
        for item in &message.content {
            match item {
                ContentItem::Text { text } if !text.is_empty() => {
                    turn.stream_text.push_str(text);
                    turn.registry.push(Block::text(text.as_str()));
                }
                ContentItem::Thinking { thinking } if !thinking.is_empty() => {
                    turn.stream_thinking.push_str(thinking);
                    turn.registry.push(Block::reasoning(thinking.as_str()));
                }
                ContentItem::ToolUse { id, name, input } => {
                    let invocation = self.new_invocation(id, name, input.clone());
                    turn.registry.push(Block::ToolInvocation(invocation));
                }
                _ => {}
            }
        }
    }

    /// Closes out a turn: pretty-prints tool input, fills delegation fields,
    /// and fixes the accumulated text. Running it again changes nothing.
    pub fn finalize(&self, turn: &mut Turn) {
        for invocation in turn.registry.invocations_mut() {
            if invocation.input.is_empty() {
                continue;
            }
            invocation.input = pretty_json(&invocation.input);
            if let Some(delegation) = invocation.delegation.as_mut() {
                delegation.apply_input(&invocation.input);
            }
        }

        if turn.streaming {
            turn.text.clone_from(&turn.stream_text);
            turn.thinking.clone_from(&turn.stream_thinking);
            turn.streaming = false;
        }
    }
}

fn apply_delta(turn: &mut Turn, delta: &Delta) {
    match delta {
        Delta::Text(fragment) => {
            turn.stream_text.push_str(fragment);
            if let Some(block) = turn.registry.last_text_mut() {
                block.text.push_str(fragment);
            } else {
                turn.registry.push(Block::text(fragment.as_str()));
            }
        }
        Delta::Thinking(fragment) => {
            turn.stream_thinking.push_str(fragment);
            if let Some(block) = turn.registry.last_reasoning_mut() {
                block.text.push_str(fragment);
            } else {
                turn.registry.push(Block::reasoning(fragment.as_str()));
            }
        }
        Delta::InputJson(fragment) => {
            if let Some(invocation) = turn.registry.last_invocation_mut() {
                invocation.input.push_str(fragment);
            } else {
                debug!("dropping input fragment with no open tool invocation");
            }
        }
    }
}

/// Adds a top-level result block per tool result item. A result closing a
/// delegation also attaches the run's metadata and drops the agent id text.
fn apply_tool_results(turn: &mut Turn, message: &MessageEvent) {
    for item in &message.content {
        let ContentItem::ToolResult {
            tool_use_id,
            content,
            is_error,
        } = item
        else {
            continue;
        };

        let closes_delegation = match turn.registry.delegation_mut(tool_use_id) {
            Some(ToolInvocation {
                delegation: Some(delegation),
                ..
            }) => {
                if let Some(meta) = message
                    .tool_use_result
                    .as_ref()
                    .and_then(DelegationMeta::from_tool_use_result)
                {
                    delegation.meta = Some(meta);
                }
                true
            }
            _ => false,
        };

        turn.registry.push(Block::ToolResult(ToolResult {
            tool_use_id: tool_use_id.clone(),
            output: extract_tool_result_content(content, closes_delegation),
            is_error: *is_error,
        }));
    }
}
