use serde::Serialize;

use super::block::Block;
use super::registry::BlockRegistry;
use crate::stream::{DecodedLine, ResponseMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Error,
}

/// One conversational turn.
///
/// Assistant turns are built incrementally while `streaming` is set; the
/// stream accumulators become the final `text`/`thinking` on finalization,
/// after which the turn no longer changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub(crate) role: Role,
    pub(crate) registry: BlockRegistry,
    pub(crate) streaming: bool,
    pub(crate) stream_text: String,
    pub(crate) stream_thinking: String,
    pub(crate) text: String,
    pub(crate) thinking: String,
    /// Set once any partial-message event arrives. Whole assistant messages
    /// are ignored from then on, as their content was already streamed.
    pub(crate) saw_partial: bool,
    pub(crate) meta: ResponseMeta,
}

impl Turn {
    fn new(role: Role, streaming: bool) -> Self {
        Self {
            role,
            registry: BlockRegistry::new(),
            streaming,
            stream_text: String::new(),
            stream_thinking: String::new(),
            text: String::new(),
            thinking: String::new(),
            saw_partial: false,
            meta: ResponseMeta::default(),
        }
    }

    pub fn user(prompt: impl Into<String>) -> Self {
        let mut turn = Self::new(Role::User, false);
        turn.text = prompt.into();
        turn
    }

    /// An empty assistant turn ready to receive stream events.
    pub fn assistant() -> Self {
        Self::new(Role::Assistant, true)
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut turn = Self::new(Role::Error, false);
        turn.text = message.into();
        turn
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn blocks(&self) -> &[Block] {
        self.registry.blocks()
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.registry.into_blocks()
    }

    /// Visible text so far: the live accumulator while streaming, the final
    /// text afterwards.
    pub fn text(&self) -> &str {
        if self.streaming {
            &self.stream_text
        } else {
            &self.text
        }
    }

    pub fn thinking(&self) -> &str {
        if self.streaming {
            &self.stream_thinking
        } else {
            &self.thinking
        }
    }

    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    pub(crate) fn merge_meta(&mut self, line: &DecodedLine) {
        self.meta.merge(line);
    }

    pub(crate) fn set_meta(&mut self, meta: ResponseMeta) {
        self.meta = meta;
    }
}
