//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a composition instance.
///
/// Deserializable so it can be embedded in a settings file; missing fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Start in the paused state; trigger nodes are started on first unpause.
    pub start_paused: bool,
    /// How long `stop()` waits for in-flight firings before detaching workers.
    pub stop_timeout_ms: u64,
    /// Maximum length of port-value summaries in telemetry.
    pub summary_max_len: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            start_paused: false,
            stop_timeout_ms: 5000,
            summary_max_len: 64,
        }
    }
}

impl RuntimeConfig {
    /// [`stop_timeout_ms`](Self::stop_timeout_ms) as a [`Duration`].
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert!(!config.start_paused);
        assert_eq!(config.stop_timeout(), Duration::from_secs(5));
        assert_eq!(config.summary_max_len, 64);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RuntimeConfig = toml::from_str("stop_timeout_ms = 250").unwrap();
        assert_eq!(config.stop_timeout_ms, 250);
        assert_eq!(config.summary_max_len, 64);
        assert!(!config.start_paused);
    }
}
