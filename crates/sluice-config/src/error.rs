//! Configuration errors.

use std::path::{Path, PathBuf};

use sluice_core::GraphError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Anything that can go wrong loading, saving, or compiling a composition or
/// settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A composition or settings file could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    ReadFile {
        /// File that was being read.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A composition or settings file could not be written.
    #[error("cannot write '{}': {source}", path.display())]
    WriteFile {
        /// File that was being written.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A parent directory could not be created.
    #[error("cannot create directory '{}': {source}", path.display())]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this format.
    #[error("invalid TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The value could not be written as TOML.
    #[error("cannot serialize to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// No factory composition, user composition, or file has this name.
    #[error("composition not found: {0}")]
    CompositionNotFound(String),

    /// The composition refers to classes, nodes, or ports that do not exist.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The composition is well-formed but its graph is not schedulable.
    #[error("invalid composition graph: {0}")]
    Graph(#[from] GraphError),

    /// A subcomposition file includes itself, directly or through others.
    #[error("subcomposition cycle through '{}'", .0.display())]
    SubcompositionCycle(PathBuf),
}

impl ConfigError {
    /// [`ReadFile`](Self::ReadFile) for `path`.
    pub fn read_file(path: &Path, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.to_path_buf(),
            source,
        }
    }

    /// [`WriteFile`](Self::WriteFile) for `path`.
    pub fn write_file(path: &Path, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.to_path_buf(),
            source,
        }
    }

    /// [`CreateDir`](Self::CreateDir) for `path`.
    pub fn create_dir(path: &Path, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.to_path_buf(),
            source,
        }
    }

    /// `true` if the error means the named composition does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::CompositionNotFound(_) => true,
            Self::ReadFile { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
