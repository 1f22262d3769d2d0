//! Client configuration, loaded from a RON file.
//!
//! Every field has a default, so a missing file or a partial file both work:
//!
//! ```ron
//! (
//!     set_path_throttle_ms: 250,
//!     reload_coalescing: true,
//! )
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{EVENT_BUFFER, SET_PATH_THROTTLE};

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Tunables for a study session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Minimum spacing between outbound `setPath` frames, in milliseconds.
    pub set_path_throttle_ms: u64,
    /// Skip divergence-triggered reloads while one is already in flight.
    pub reload_coalescing: bool,
    /// Capacity of the session driver's inbound channel.
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            set_path_throttle_ms: SET_PATH_THROTTLE.as_millis() as u64,
            reload_coalescing: true,
            event_buffer: EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Load from a RON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no client config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn set_path_throttle(&self) -> Duration {
        Duration::from_millis(self.set_path_throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("client.ron")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.set_path_throttle(), SET_PATH_THROTTLE);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(set_path_throttle_ms: 50)").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.set_path_throttle_ms, 50);
        assert!(config.reload_coalescing);
        assert_eq!(config.event_buffer, EVENT_BUFFER);
    }

    #[test]
    fn test_bad_ron_is_an_error() {
        assert!(matches!(
            ClientConfig::from_ron("(set_path_throttle_ms: \"soon\")"),
            Err(ConfigError::Ron(_))
        ));
    }
}
