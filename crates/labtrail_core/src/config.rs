//! Core configuration loaded from JSON.
//!
//! # Invariants
//! - Every field has a default; an empty object is a valid config.
//! - `validate` runs on every load path.

use crate::sync::merge::DedupStrategy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LIVE_BUFFER: usize = 16;

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Tunables of the synchronization layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Display-merge dedup rule.
    pub dedup: DedupStrategy,
    /// Upper bound for one remote call.
    pub remote_timeout_ms: u64,
    /// Snapshots buffered per live stream before the producer waits.
    pub live_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dedup: DedupStrategy::default(),
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            live_buffer: DEFAULT_LIVE_BUFFER,
        }
    }
}

impl SyncConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file; in-memory when absent.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; file logging stays off when absent.
    pub log_dir: Option<PathBuf>,
    pub sync: SyncConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            sync: SyncConfig::default(),
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.remote_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.remote_timeout_ms must be positive".to_string(),
            ));
        }
        if self.sync.live_buffer == 0 {
            return Err(ConfigError::Invalid(
                "sync.live_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use crate::sync::merge::DedupStrategy;

    #[test]
    fn empty_object_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").expect("empty config should parse");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.sync.dedup, DedupStrategy::ByName);
        assert_eq!(config.sync.remote_timeout_ms, 10_000);
    }

    #[test]
    fn partial_sync_section_keeps_other_defaults() {
        let config = CoreConfig::from_json_str(
            r#"{"db_path": "/tmp/labtrail.db", "sync": {"dedup": "by_identifier"}}"#,
        )
        .expect("config should parse");
        assert_eq!(config.sync.dedup, DedupStrategy::ByIdentifier);
        assert_eq!(config.sync.live_buffer, 16);
        assert_eq!(
            config.db_path.as_deref(),
            Some(std::path::Path::new("/tmp/labtrail.db"))
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"sync": {"remote_timeout_ms": 0}}"#)
            .expect_err("zero timeout must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = CoreConfig::from_file("/nonexistent/labtrail.json")
            .expect_err("missing file must fail");
        assert!(err.to_string().contains("/nonexistent/labtrail.json"));
    }
}
