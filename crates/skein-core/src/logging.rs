use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::LogConfig;

static INIT: OnceLock<()> = OnceLock::new();

const LOG_ENV: &str = "SKEIN_LOG";
const DEFAULT_LOG_FILE: &str = "skein.log";

/// Filter precedence: `SKEIN_LOG`, then `RUST_LOG`, then the configured level.
fn resolve_env_filter(config: &LogConfig) -> EnvFilter {
    if let Ok(level) = std::env::var(LOG_ENV)
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn file_writer(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Initializes logging once per process. Later calls are no-ops.
///
/// Logs go to stderr so they never mix with transcript output, or to
/// `config.file` when set. Fails when the log file cannot be opened.
pub fn init(config: &LogConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = resolve_env_filter(config);
    if let Some(path) = &config.file {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(file_writer(path)?);
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .try_init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init();
    }
    let _ = INIT.set(());
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_file_writer_creates_missing_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("skein.log");
        file_writer(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unopenable_log_file_is_an_error() {
        let dir = tempdir().unwrap();
        let taken = dir.path().join("taken");
        std::fs::create_dir(&taken).unwrap();

        let err = file_writer(&taken).err().map(|e| e.to_string());
        assert_eq!(err, Some(format!("open log file {}", taken.display())));

        let config = LogConfig {
            file: Some(taken),
            ..LogConfig::default()
        };
        assert!(init(&config).is_err());
    }
}
