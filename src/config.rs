//! Configuration types for promdiag

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Collector configuration
///
/// Every field has a default, so an empty JSON object is a valid config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Per-resource fetch timeout (default: 30 seconds)
    ///
    /// Profiling endpoints can block for a while before answering, so this is
    /// generous. A fetch that exceeds it fails that resource only.
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Directory the archive is written into (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// User-Agent header sent with every fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
            output_dir: default_output_dir(),
            user_agent: default_user_agent(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: CollectorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the collector cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout.is_zero() {
            return Err(Error::Config {
                message: "fetch timeout must be greater than zero".to_string(),
                key: Some("fetch_timeout".to_string()),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config {
                message: "user agent must not be empty".to_string(),
                key: Some("user_agent".to_string()),
            });
        }
        Ok(())
    }
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_user_agent() -> String {
    format!("promdiag/{}", env!("CARGO_PKG_VERSION"))
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
