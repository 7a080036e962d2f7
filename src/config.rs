//! Global user configuration
//!
//! Stored in `config.toml` under the platform config directory
//! (`~/.config/gestalt/` on Linux). `GESTALT_CONFIG` points at another file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::OutputFormat;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "GESTALT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Output format used when `--format` isn't passed
    pub default_format: Option<OutputFormat>,

    /// Log filter directives (e.g., "gestalt_cli=info")
    pub log: Option<String>,
}

impl GlobalConfig {
    /// Returns the config file location
    pub fn path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("dev", "gestalt", "gestalt").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads the configuration, falling back to defaults when there's no file
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read global config: {}", path.display()))?;

        toml::from_str(&content).map_err(|e| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()
        })
    }
}
