//! Application configuration
//!
//! Configuration is loaded from a TOML file:
//! 1. the path given on the command line, if any
//! 2. the `RELINK_CONFIG` environment variable
//! 3. `~/.config/relink/config.toml`
//!
//! A missing file yields the defaults, so the tool works out of the box in
//! the current directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
const ENV_CONFIG: &str = "RELINK_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directories indexed for references and queries
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,

    /// Regexes of paths excluded from indexing entirely
    #[serde(default)]
    pub filters: Vec<String>,

    /// Regexes of paths that exist (and can be moved) but are never parsed
    #[serde(default)]
    pub skip_parse: Vec<String>,

    /// Append-only edit log; unset disables logging
    #[serde(default)]
    pub edit_log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            filters: Vec::new(),
            skip_parse: Vec::new(),
            edit_log_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path. A file that does not exist
    /// yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from a TOML string (useful for testing).
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        toml::from_str(toml_content).context("Failed to parse config TOML")
    }

    /// Get the config file path.
    ///
    /// Can be overridden with the RELINK_CONFIG environment variable.
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relink")
            .join("config.toml")
    }
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}
