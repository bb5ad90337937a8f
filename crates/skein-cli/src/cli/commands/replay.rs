//! One-pass assembly of a complete capture.

use std::path::Path;

use anyhow::{Context, Result};
use skein_core::config::Config;
use skein_core::session::{Response, Session};
use skein_core::transcript::Assembler;
use skein_core::transport::read_capture;
use tokio::io::BufReader;
use tracing::debug;

use super::print_session;
use crate::cli::OutputFormat;

pub async fn run(input: Option<&Path>, format: OutputFormat, config: &Config) -> Result<()> {
    let max_line_bytes = config.reader_options().max_line_bytes;
    let lines = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("read capture {}", path.display()))?;
            read_capture(BufReader::new(file), max_line_bytes)
                .await
                .with_context(|| format!("read capture {}", path.display()))?
        }
        None => read_capture(BufReader::new(tokio::io::stdin()), max_line_bytes)
            .await
            .context("read capture from stdin")?,
    };

    let response = Response::from_decoded(lines);
    debug!(events = response.events.len(), "capture decoded");

    let mut session = Session::new(Assembler::new(config.assembler_options()));
    session.record_response(&response);
    print_session(&session, format)
}
