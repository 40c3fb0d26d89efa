//! Shared CLI helpers used across multiple commands.

use sluice_config::{CompositionFile, CompositionSource, NodeRegistry, load_composition};
use sluice_core::PortValue;

/// A composition file together with the registry its classes resolve in.
pub struct LoadedComposition {
    /// The parsed file.
    pub file: CompositionFile,
    /// Built-in classes plus the file's subcompositions.
    pub registry: NodeRegistry,
    /// Where the file came from.
    pub source: CompositionSource,
}

/// Load a composition by name or path.
///
/// Searches in this order:
/// 1. Factory compositions (by name)
/// 2. User compositions (by name)
/// 3. File path
pub fn load(name: &str) -> anyhow::Result<LoadedComposition> {
    let (file, source) = match load_composition(name) {
        Ok(found) => found,
        Err(e) if e.is_not_found() => anyhow::bail!(
            "Composition '{}' not found. Use 'sluice compositions' to see available compositions.",
            name
        ),
        Err(e) => return Err(e.into()),
    };
    let registry = file.resolve_registry(&source.base_dir(), &NodeRegistry::new())?;
    Ok(LoadedComposition {
        file,
        registry,
        source,
    })
}

/// Describe where a composition came from.
pub fn source_label(source: &CompositionSource) -> String {
    match source {
        CompositionSource::Factory => "factory".to_string(),
        CompositionSource::File(path) => path.display().to_string(),
    }
}

/// Parse a port value for clap's `value_parser`.
///
/// Values are JSON; anything that is not valid JSON is taken as text.
pub fn parse_value(s: &str) -> Result<PortValue, String> {
    Ok(serde_json::from_str(s).unwrap_or_else(|_| PortValue::Text(s.to_string())))
}
