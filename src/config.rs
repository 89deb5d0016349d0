//! Optional JSON configuration.
//!
//! Read from `$CMPBRANCH_CONFIG`, or `<config dir>/cmpbranch/config.json`.
//! A missing file means defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::workflow::OpenTiming;

const CONFIG_ENV: &str = "CMPBRANCH_CONFIG";

/// Errors returned while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Git executable used for clone, fetch and checkout.
    pub git_path: String,
    /// Remote whose URL is cloned.
    pub remote: String,
    /// Editor command; the workspace path is appended.
    pub editor: Vec<String>,
    pub open_timing: OpenTiming,
    /// Directory workspaces are created in instead of the OS temp dir.
    pub temp_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git_path: "git".to_string(),
            remote: "origin".to_string(),
            editor: vec!["code".to_string(), "--new-window".to_string()],
            open_timing: OpenTiming::default(),
            temp_root: None,
        }
    }
}

impl Config {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Where configuration is read from, if anywhere.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("cmpbranch").join("config.json"))
}
