//! Core library for skein.
//!
//! Decodes the Claude CLI `stream-json` output and assembles it into
//! structured transcripts. Rendering and process management live in the
//! callers.

pub mod config;
pub mod logging;
pub mod session;
pub mod stream;
pub mod summary;
pub mod transcript;
pub mod transport;
