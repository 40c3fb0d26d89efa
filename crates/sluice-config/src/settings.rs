//! User settings file.
//!
//! ```toml
//! [runtime]
//! stop_timeout_ms = 2000
//! summary_max_len = 32
//!
//! [telemetry]
//! mode = "all"
//! scope = "Top/Sub"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sluice_core::CompositionIdentifier;
use sluice_runtime::RuntimeConfig;

use crate::error::ConfigError;
use crate::paths::settings_path;

/// Which telemetry stream the command line prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryMode {
    /// Executions, port activity, drops and failures, without value summaries.
    #[default]
    Events,
    /// Everything, with value summaries.
    All,
    /// Nothing.
    None,
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Stream to print.
    pub mode: TelemetryMode,
    /// Composition the subscription is scoped to.
    pub scope: CompositionIdentifier,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            mode: TelemetryMode::Events,
            scope: CompositionIdentifier::top(),
        }
    }
}

/// Everything the settings file holds. Missing sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Runtime tunables.
    pub runtime: RuntimeConfig,
    /// Telemetry output.
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Load the user settings file, or defaults if there is none.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = settings_path();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }
}
