use super::assembler::Assembler;
use super::block::Block;
use super::turn::Turn;
use crate::stream::StreamEvent;

/// Assembles a complete event list into a finalized assistant turn.
///
/// This is the incremental path run to completion: every event is routed
/// into a fresh turn in order, then the turn is finalized.
pub fn extract_turn<'a, I>(events: I, assembler: &Assembler) -> Turn
where
    I: IntoIterator<Item = &'a StreamEvent>,
{
    let mut turn = Turn::assistant();
    for event in events {
        assembler.route(&mut turn, event);
    }
    assembler.finalize(&mut turn);
    turn
}

/// Block list of [`extract_turn`].
pub fn extract_blocks<'a, I>(events: I, assembler: &Assembler) -> Vec<Block>
where
    I: IntoIterator<Item = &'a StreamEvent>,
{
    extract_turn(events, assembler).into_blocks()
}
