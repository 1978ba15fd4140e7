use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration for opening a [`SqliteValueStore`](crate::SqliteValueStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Value for `PRAGMA journal_mode`.
    pub journal_mode: String,
    /// Value for `PRAGMA synchronous`.
    pub synchronous: String,
    /// How long to wait on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            journal_mode: "WAL".into(),
            synchronous: "NORMAL".into(),
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Default settings for a database file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// PRAGMA values end up inside SQL text, so only plain words are allowed.
    pub(crate) fn validate(&self) -> StoreResult<()> {
        for (name, value) in [
            ("journal_mode", &self.journal_mode),
            ("synchronous", &self.synchronous),
        ] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(StoreError::Config(format!("invalid {name}: {value:?}")));
            }
        }
        Ok(())
    }
}
