//! Incremental assembly of a live stream.

use std::path::Path;

use anyhow::{Context, Result};
use skein_core::config::Config;
use skein_core::session::Session;
use skein_core::transcript::Assembler;
use skein_core::transport::{drive, spawn_line_reader};
use tokio::io::BufReader;
use tracing::debug;

use super::print_session;
use crate::cli::OutputFormat;

pub async fn run(input: Option<&Path>, format: OutputFormat, config: &Config) -> Result<()> {
    let options = config.reader_options();
    let (rx, _reader) = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("open stream {}", path.display()))?;
            spawn_line_reader(BufReader::new(file), options)
        }
        None => spawn_line_reader(BufReader::new(tokio::io::stdin()), options),
    };

    let mut session = Session::new(Assembler::new(config.assembler_options()));
    session.begin_response();
    let lines = drive(rx, &mut session).await?;
    debug!(lines, "stream finished");

    print_session(&session, format)
}
