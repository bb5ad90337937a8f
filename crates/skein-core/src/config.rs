//! Configuration management for skein.
//!
//! Loads configuration from ${SKEIN_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transcript::{AssemblerOptions, DEFAULT_DELEGATION_TOOL};
use crate::transport::ReaderOptions;

/// Transcript assembly settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Tool names treated as sub-agent delegations.
    pub delegation_tools: Vec<String>,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            delegation_tools: vec![DEFAULT_DELEGATION_TOOL.to_string()],
        }
    }
}

/// Line transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub channel_capacity: usize,
    pub max_line_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let reader = ReaderOptions::default();
        Self {
            channel_capacity: reader.channel_capacity,
            max_line_bytes: reader.max_line_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when no env override is set.
    pub level: String,
    /// Log file path. Logs go to stderr when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transcript: TranscriptConfig,
    pub stream: StreamConfig,
    pub log: LogConfig,
}

/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for skein configuration.
    //!
    //! SKEIN_HOME resolution order:
    //! 1. SKEIN_HOME environment variable (if set)
    //! 2. ~/.config/skein (default)

    use std::path::PathBuf;

    /// Returns the skein home directory.
    pub fn skein_home() -> PathBuf {
        if let Ok(home) = std::env::var("SKEIN_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".skein"),
            |h| h.join(".config").join("skein"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        skein_home().join("config.toml")
    }
}

impl Config {
    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    pub fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            delegation_tools: self.transcript.delegation_tools.clone(),
        }
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            channel_capacity: self.stream.channel_capacity,
            max_line_bytes: self.stream.max_line_bytes,
        }
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename).
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.transcript.delegation_tools, vec!["Task"]);
        assert_eq!(config.stream.channel_capacity, 256);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[transcript]\ndelegation_tools = [\"Task\", \"Agent\"]\n\n[log]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.transcript.delegation_tools, vec!["Task", "Agent"]);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.file, None);
        assert_eq!(config.stream, StreamConfig::default());
        assert_eq!(
            config.assembler_options().delegation_tools,
            vec!["Task", "Agent"]
        );
    }

    #[test]
    fn test_load_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[stream\nchannel_capacity = ").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_default_template_matches_defaults() {
        let parsed: Config = toml::from_str(default_config_template()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_init_creates_file_and_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        Config::init(&config_path).unwrap();
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("delegation_tools"));

        let err = Config::init(&config_path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
