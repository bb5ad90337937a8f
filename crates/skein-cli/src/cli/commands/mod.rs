//! CLI command handlers.

use anyhow::{Context, Result};
use skein_core::session::Session;
use skein_core::transcript::{Block, Turn};

use super::OutputFormat;
use super::render;

pub mod config;
pub mod follow;
pub mod replay;

/// Prints every turn of `session`, followed by the usage footer.
/// JSON output is the block list of the last assistant turn.
fn print_session(session: &Session, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for turn in session.turns() {
                for line in render::turn_lines(turn) {
                    println!("{line}");
                }
            }
            if let Some(footer) = render::stats_line(session.stats()) {
                println!("{footer}");
            }
        }
        OutputFormat::Json => {
            let blocks: &[Block] = session
                .last_assistant()
                .map(Turn::blocks)
                .unwrap_or_default();
            let json = serde_json::to_string_pretty(blocks).context("serialize blocks")?;
            println!("{json}");
        }
    }
    Ok(())
}
