//! Runtime configuration.
//!
//! Defaults, then an optional JSON file, then environment overrides. The CLI
//! layers its own flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_QUIESCENCE_MS: &str = "CODECASE_QUIESCENCE_MS";
pub const ENV_STORE_TIMEOUT_MS: &str = "CODECASE_STORE_TIMEOUT_MS";
pub const ENV_JOURNAL_DIR: &str = "CODECASE_JOURNAL_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{var} must be a whole number of milliseconds, got {value:?}")]
    BadEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Idle interval after the last edit before evaluation runs.
    pub quiescence_ms: u64,
    /// Upper bound on a single profile store call.
    pub store_timeout_ms: u64,
    /// Playthrough journals live here; none keeps playthroughs in memory.
    pub journal_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: 1000,
            store_timeout_ms: 5000,
            journal_dir: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(path, &text)
    }

    /// Apply `CODECASE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any lookup, so tests need not touch the real
    /// environment.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_QUIESCENCE_MS) {
            self.quiescence_ms = parse_ms(ENV_QUIESCENCE_MS, value)?;
        }
        if let Some(value) = lookup(ENV_STORE_TIMEOUT_MS) {
            self.store_timeout_ms = parse_ms(ENV_STORE_TIMEOUT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_JOURNAL_DIR) {
            self.journal_dir = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        Ok(self)
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn parse_ms(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::BadEnv { var, value })
}
