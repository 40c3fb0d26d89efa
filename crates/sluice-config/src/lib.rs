//! Composition files, settings, and factory compositions for sluice.
//!
//! # Features
//!
//! - **Composition files**: Load and save compositions as TOML, validate them
//!   against a node registry, and compile them to a schedule
//! - **Subcompositions**: Register other composition files as node classes
//! - **Settings**: Runtime and telemetry defaults from a user settings file
//! - **Paths**: Platform-specific configuration and composition directories
//! - **Factory Compositions**: Built-in compositions demonstrating scheduling
//!
//! # Example
//!
//! ```rust
//! use sluice_config::{CompositionFile, NodeConfig};
//! use sluice_nodes::NodeRegistry;
//!
//! let file = CompositionFile::new("Counter")
//!     .with_node(NodeConfig::new("Fire", "fire_on_request"))
//!     .with_node(NodeConfig::new("Count", "count"))
//!     .with_cable("Fire:fired", "Count:increment")
//!     .with_published_output("count", "Count:count");
//!
//! let schedule = file.compile(&NodeRegistry::new()).unwrap();
//! assert_eq!(schedule.triggers().len(), 1);
//! ```

mod composition;
mod error;
mod settings;

/// Platform-specific paths for compositions and settings.
pub mod paths;

/// Composition file validation.
pub mod validation;

/// Factory compositions bundled with the library.
pub mod factory;

use std::path::PathBuf;

pub use composition::{
    CableConfig, CompositionFile, NodeConfig, PublishedInputConfig, PublishedOutputConfig,
    SubcompositionConfig,
};
pub use error::ConfigError;
pub use factory::{
    FACTORY_COMPOSITION_NAMES, factory_composition_names, factory_compositions,
    get_factory_composition, is_factory_composition,
};
pub use paths::{
    composition_name_from_path, find_composition, list_user_compositions, settings_path,
    user_compositions_dir, user_config_dir,
};
pub use settings::{Settings, TelemetryMode, TelemetrySettings};
pub use validation::{ValidationError, ValidationResult, validate_composition};

/// Re-export commonly used types from sluice-nodes
pub use sluice_nodes::{NodeCategory, NodeRegistry};

/// Where a loaded composition came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionSource {
    /// Bundled with the library.
    Factory,
    /// Read from this file.
    File(PathBuf),
}

impl CompositionSource {
    /// Directory subcomposition paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match self {
            Self::Factory => PathBuf::from("."),
            Self::File(path) => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), std::path::Path::to_path_buf),
        }
    }
}

/// Load a composition by factory name, user composition name, or file path,
/// in that order.
pub fn load_composition(name: &str) -> Result<(CompositionFile, CompositionSource), ConfigError> {
    if let Some(file) = get_factory_composition(name) {
        return Ok((file, CompositionSource::Factory));
    }
    let path = find_composition(name)
        .ok_or_else(|| ConfigError::CompositionNotFound(name.to_string()))?;
    let file = CompositionFile::load(&path)?;
    tracing::debug!("loaded composition '{}' from {}", file.name, path.display());
    Ok((file, CompositionSource::File(path)))
}
