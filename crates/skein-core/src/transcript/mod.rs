//! Transcript assembly: turns a sequence of stream events into ordered blocks.
//!
//! [`Assembler::route`] applies events to a streaming [`Turn`] one at a time
//! and [`Assembler::finalize`] closes it. [`extract_blocks`] runs the same
//! steps over a complete event list.

mod assembler;
mod batch;
mod block;
mod content;
mod registry;
mod turn;

pub use assembler::{Assembler, AssemblerOptions, DEFAULT_DELEGATION_TOOL};
pub use batch::{extract_blocks, extract_turn};
pub use block::{
    Block, BlockKind, Delegation, DelegationMeta, SubBlock, TextBlock, ToolInvocation, ToolResult,
};
pub use content::{AGENT_ID_PREFIX, extract_tool_result_content, pretty_json};
pub use registry::BlockRegistry;
pub use turn::{Role, Turn};
