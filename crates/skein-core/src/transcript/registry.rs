use serde::Serialize;

use super::block::{Block, BlockKind, TextBlock, ToolInvocation, ToolResult};

/// Ordered list of the blocks in one turn.
///
/// Blocks are only ever appended. Lookups search from the end, since the
/// stream always extends the most recent block of a kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Index of the most recent block of `kind`.
    pub fn last_index_of(&self, kind: BlockKind) -> Option<usize> {
        self.blocks.iter().rposition(|block| block.kind() == kind)
    }

    pub(crate) fn last_text_mut(&mut self) -> Option<&mut TextBlock> {
        self.blocks.iter_mut().rev().find_map(|block| match block {
            Block::Text(text) => Some(text),
            _ => None,
        })
    }

    pub(crate) fn last_reasoning_mut(&mut self) -> Option<&mut TextBlock> {
        self.blocks.iter_mut().rev().find_map(|block| match block {
            Block::Reasoning(text) => Some(text),
            _ => None,
        })
    }

    pub(crate) fn last_invocation_mut(&mut self) -> Option<&mut ToolInvocation> {
        self.blocks.iter_mut().rev().find_map(|block| match block {
            Block::ToolInvocation(invocation) => Some(invocation),
            _ => None,
        })
    }

    /// Index of the delegation invocation with `id`.
    pub fn delegation_index(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|block| {
            matches!(block, Block::ToolInvocation(inv) if inv.is_delegation() && inv.id == id)
        })
    }

    pub(crate) fn delegation_mut(&mut self, id: &str) -> Option<&mut ToolInvocation> {
        let index = self.delegation_index(id)?;
        match &mut self.blocks[index] {
            Block::ToolInvocation(invocation) => Some(invocation),
            _ => None,
        }
    }

    pub(crate) fn invocations_mut(&mut self) -> impl Iterator<Item = &mut ToolInvocation> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::ToolInvocation(invocation) => Some(invocation),
            _ => None,
        })
    }

    /// The result block answering the invocation `tool_use_id`, if any.
    pub fn result_for(&self, tool_use_id: &str) -> Option<&ToolResult> {
        self.blocks.iter().find_map(|block| match block {
            Block::ToolResult(result) if result.tool_use_id == tool_use_id => Some(result),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::block::Delegation;

    fn invocation(id: &str, delegation: bool) -> Block {
        Block::ToolInvocation(ToolInvocation {
            id: id.into(),
            name: if delegation { "Task" } else { "Read" }.into(),
            input: String::new(),
            delegation: delegation.then(Delegation::default),
        })
    }

    #[test]
    fn test_delegation_index() {
        let mut registry = BlockRegistry::new();
        registry.push(Block::text("hello"));
        registry.push(invocation("task_1", true));
        registry.push(invocation("read_1", false));
        registry.push(invocation("task_2", true));

        assert_eq!(registry.delegation_index("task_1"), Some(1));
        assert_eq!(registry.delegation_index("task_2"), Some(3));
        assert_eq!(registry.delegation_index("read_1"), None);
        assert_eq!(registry.delegation_index("missing"), None);
    }

    #[test]
    fn test_last_index_of() {
        let mut registry = BlockRegistry::new();
        assert_eq!(registry.last_index_of(BlockKind::Text), None);
        registry.push(Block::text("a"));
        registry.push(invocation("t1", false));
        registry.push(Block::text("b"));
        registry.push(Block::reasoning("r"));

        assert_eq!(registry.last_index_of(BlockKind::Text), Some(2));
        assert_eq!(registry.last_index_of(BlockKind::Reasoning), Some(3));
        assert_eq!(registry.last_index_of(BlockKind::ToolInvocation), Some(1));
        assert_eq!(registry.last_index_of(BlockKind::ToolResult), None);
    }

    #[test]
    fn test_last_text_skips_other_kinds() {
        let mut registry = BlockRegistry::new();
        registry.push(Block::text("a"));
        registry.push(invocation("t1", false));
        if let Some(text) = registry.last_text_mut() {
            text.text.push('b');
        }
        assert_eq!(registry.blocks()[0], Block::text("ab"));
    }

    #[test]
    fn test_result_for() {
        let mut registry = BlockRegistry::new();
        registry.push(Block::ToolResult(ToolResult {
            tool_use_id: "t1".into(),
            output: "ok".into(),
            is_error: false,
        }));
        assert_eq!(registry.result_for("t1").map(|r| r.output.as_str()), Some("ok"));
        assert!(registry.result_for("t2").is_none());
    }
}
