//! Composition file format and operations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sluice_core::{CompositionGraph, GraphSchedule, PortValue, SchedulingPolicy};
use sluice_nodes::{NodeCategory, NodeRegistry};
use sluice_runtime::{NodeClassResolver, SubcompositionClass};

use crate::error::ConfigError;
use crate::validation::{ValidationResult, validate_composition};

/// One node of a composition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Node name, unique within the composition.
    pub name: String,

    /// Node class identifier.
    pub class: String,

    /// Scheduling policy overrides, keyed by trigger port name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub policies: BTreeMap<String, SchedulingPolicy>,

    /// Constant input values, keyed by input port name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constants: BTreeMap<String, PortValue>,
}

impl NodeConfig {
    /// Create a node of class `class`.
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            policies: BTreeMap::new(),
            constants: BTreeMap::new(),
        }
    }

    /// Override the policy of trigger port `port`.
    pub fn with_policy(mut self, port: impl Into<String>, policy: SchedulingPolicy) -> Self {
        self.policies.insert(port.into(), policy);
        self
    }

    /// Set a constant on input port `port`.
    pub fn with_constant(mut self, port: impl Into<String>, value: impl Into<PortValue>) -> Self {
        self.constants.insert(port.into(), value.into());
        self
    }
}

/// One cable, between two `Node:port` identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CableConfig {
    /// Output port identifier.
    pub from: String,
    /// Input port identifier.
    pub to: String,
    /// Whether the cable carries values to the next firing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub feedback: bool,
}

/// A published input port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedInputConfig {
    /// Published name.
    pub name: String,
    /// Whether the port carries data.
    #[serde(default = "default_true")]
    pub data: bool,
}

/// A published output port, aliasing a node port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedOutputConfig {
    /// Published name.
    pub name: String,
    /// Port identifier it exposes.
    pub port: String,
}

/// A composition file registered as a node class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubcompositionConfig {
    /// Class identifier nodes use to instantiate it.
    pub class: String,
    /// Composition file, relative to the including file.
    pub path: PathBuf,
}

fn default_true() -> bool {
    true
}

/// Composition file format.
///
/// # TOML Format
///
/// ```toml
/// name = "Allow Alternating"
/// description = "Counts every other request"
///
/// [[nodes]]
/// name = "Fire"
/// class = "fire_on_request"
/// [nodes.policies]
/// fired = "drop"
///
/// [[nodes]]
/// name = "Alt"
/// class = "allow_alternating"
///
/// [[nodes]]
/// name = "Count"
/// class = "count"
/// [nodes.constants]
/// increment = 1
///
/// [[cables]]
/// from = "Fire:fired"
/// to = "Alt:value"
///
/// [[cables]]
/// from = "Alt:allowed"
/// to = "Count:increment"
///
/// [[published_outputs]]
/// name = "count"
/// port = "Count:count"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositionFile {
    /// Name of the composition.
    pub name: String,

    /// Optional description of the composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Composition files used as node classes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcompositions: Vec<SubcompositionConfig>,

    /// Nodes.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Cables.
    #[serde(default)]
    pub cables: Vec<CableConfig>,

    /// Published input ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub published_inputs: Vec<PublishedInputConfig>,

    /// Published output ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub published_outputs: Vec<PublishedOutputConfig>,
}

impl CompositionFile {
    /// Create a new empty composition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            subcompositions: Vec::new(),
            nodes: Vec::new(),
            cables: Vec::new(),
            published_inputs: Vec::new(),
            published_outputs: Vec::new(),
        }
    }

    /// Create a composition with a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a node.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a cable.
    pub fn with_cable(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.cables.push(CableConfig {
            from: from.into(),
            to: to.into(),
            feedback: false,
        });
        self
    }

    /// Add a feedback cable.
    pub fn with_feedback_cable(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.cables.push(CableConfig {
            from: from.into(),
            to: to.into(),
            feedback: true,
        });
        self
    }

    /// Add a published input.
    pub fn with_published_input(mut self, name: impl Into<String>, data: bool) -> Self {
        self.published_inputs.push(PublishedInputConfig {
            name: name.into(),
            data,
        });
        self
    }

    /// Add a published output exposing `port`.
    pub fn with_published_output(mut self, name: impl Into<String>, port: impl Into<String>) -> Self {
        self.published_outputs.push(PublishedOutputConfig {
            name: name.into(),
            port: port.into(),
        });
        self
    }

    /// Load a composition from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let file: CompositionFile = toml::from_str(&content)?;
        Ok(file)
    }

    /// Load a composition from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the composition to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the composition to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check class names, node names, port identifiers, and published ports
    /// against `registry`, collecting every problem.
    pub fn validate(&self, registry: &NodeRegistry) -> ValidationResult<()> {
        validate_composition(self, registry)
    }

    /// Registers this file's subcompositions on top of `registry`.
    ///
    /// Subcomposition paths are resolved against `base_dir`; nested
    /// subcompositions are loaded recursively.
    pub fn resolve_registry(
        &self,
        base_dir: &Path,
        registry: &NodeRegistry,
    ) -> Result<NodeRegistry, ConfigError> {
        let mut stack = Vec::new();
        self.resolve_registry_inner(base_dir, registry, &mut stack)
    }

    fn resolve_registry_inner(
        &self,
        base_dir: &Path,
        registry: &NodeRegistry,
        stack: &mut Vec<PathBuf>,
    ) -> Result<NodeRegistry, ConfigError> {
        let mut resolved = registry.clone();
        for sub in &self.subcompositions {
            let path = base_dir.join(&sub.path);
            let key = path.canonicalize().unwrap_or_else(|_| path.clone());
            if stack.contains(&key) {
                return Err(ConfigError::SubcompositionCycle(path));
            }
            let child = CompositionFile::load(&path)?;
            let child_dir = path.parent().map_or_else(|| base_dir.to_path_buf(), Path::to_path_buf);

            stack.push(key);
            let child_registry = child.resolve_registry_inner(&child_dir, registry, stack)?;
            stack.pop();

            let schedule = child.compile(&child_registry)?;
            let class = SubcompositionClass::new(&sub.class, schedule)
                .with_description(child.description.as_deref().unwrap_or(&child.name));
            tracing::debug!("registered subcomposition class {} from {}", sub.class, path.display());
            resolved.register(NodeCategory::Composition, Arc::new(class));
        }
        Ok(resolved)
    }

    /// Build the composition graph, resolving port lists through `registry`.
    ///
    /// Runs [`validate`](Self::validate) first.
    pub fn build_graph(&self, registry: &NodeRegistry) -> Result<CompositionGraph, ConfigError> {
        self.validate(registry)?;

        let mut graph = CompositionGraph::new(&self.name);
        for node in &self.nodes {
            let class = registry
                .resolve(&node.class)
                .ok_or_else(|| crate::validation::ValidationError::UnknownClass {
                    node: node.name.clone(),
                    class: node.class.clone(),
                })?;
            let id = graph.add_node(
                &node.name,
                &node.class,
                class.descriptor().stateful,
                &class.ports(),
            )?;
            for (port, policy) in &node.policies {
                let port = graph.port(id, port)?;
                graph.set_trigger_policy(port, *policy)?;
            }
            for (port, value) in &node.constants {
                let port = graph.port(id, port)?;
                graph.set_constant(port, value.clone())?;
            }
        }
        for input in &self.published_inputs {
            graph.add_published_input(&input.name, input.data)?;
        }
        for cable in &self.cables {
            let from = graph.port_by_identifier(&cable.from)?;
            let to = graph.port_by_identifier(&cable.to)?;
            if cable.feedback {
                graph.connect_feedback(from, to)?;
            } else {
                graph.connect(from, to)?;
            }
        }
        for output in &self.published_outputs {
            let port = graph.port_by_identifier(&output.port)?;
            graph.add_published_output(&output.name, port)?;
        }
        Ok(graph)
    }

    /// Build and compile the composition.
    pub fn compile(&self, registry: &NodeRegistry) -> Result<Arc<GraphSchedule>, ConfigError> {
        Ok(self.build_graph(registry)?.compile()?)
    }

    /// Get the number of nodes in the composition.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the composition has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for CompositionFile {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    const ALTERNATING: &str = r#"
name = "Alternating"

[[nodes]]
name = "Fire"
class = "fire_on_request"
[nodes.policies]
fired = "drop"

[[nodes]]
name = "Alt"
class = "allow_alternating"

[[nodes]]
name = "Count"
class = "count"
[nodes.constants]
increment = 2

[[cables]]
from = "Fire:fired"
to = "Alt:value"

[[cables]]
from = "Alt:allowed"
to = "Count:increment"

[[published_outputs]]
name = "count"
port = "Count:count"
"#;

    #[test]
    fn test_parse() {
        let file = CompositionFile::from_toml(ALTERNATING).unwrap();
        assert_eq!(file.name, "Alternating");
        assert_eq!(file.len(), 3);
        assert_eq!(file.nodes[0].policies["fired"], SchedulingPolicy::Drop);
        assert_eq!(file.nodes[2].constants["increment"], PortValue::Integer(2));
        assert!(!file.cables[0].feedback);
        assert_eq!(file.published_outputs[0].port, "Count:count");
    }

    #[test]
    fn test_builder() {
        let file = CompositionFile::new("Built")
            .with_description("by hand")
            .with_node(NodeConfig::new("Fire", "fire_on_request"))
            .with_node(NodeConfig::new("Share", "share_value").with_constant("value", 3))
            .with_cable("Fire:fired", "Share:value")
            .with_published_output("out", "Share:same_value");
        assert_eq!(file.description.as_deref(), Some("by hand"));
        assert_eq!(file.len(), 2);
        assert!(file.validate(&NodeRegistry::new()).is_ok());
    }

    #[test]
    fn test_toml_roundtrip_keeps_feedback_and_constants() {
        let file = CompositionFile::new("Loop")
            .with_node(NodeConfig::new("Fire", "fire_on_request"))
            .with_node(NodeConfig::new("Add", "add").with_constant("b", 1.5))
            .with_cable("Fire:fired", "Add:a")
            .with_feedback_cable("Add:sum", "Add:b");
        let text = file.to_toml().unwrap();
        assert!(text.contains("feedback = true"));
        assert_eq!(CompositionFile::from_toml(&text).unwrap(), file);
    }

    #[test]
    fn test_compile() {
        let registry = NodeRegistry::new();
        let file = CompositionFile::from_toml(ALTERNATING).unwrap();
        let schedule = file.compile(&registry).unwrap();
        let trigger = schedule.trigger_by_identifier("Fire:fired").unwrap();
        assert_eq!(schedule.trigger(trigger).policy(), SchedulingPolicy::Drop);
        assert!(schedule.published_output("count").is_some());
    }

    #[test]
    fn test_build_graph_reports_validation_errors() {
        let registry = NodeRegistry::new();
        let file = CompositionFile::new("Bad").with_node(NodeConfig::new("X", "no_such_class"));
        let err = file.build_graph(&registry).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_compile_reports_cycles() {
        let registry = NodeRegistry::new();
        let file = CompositionFile::new("Cycle")
            .with_node(NodeConfig::new("A", "share_value"))
            .with_node(NodeConfig::new("B", "share_value"))
            .with_cable("A:same_value", "B:value")
            .with_cable("B:same_value", "A:value");
        assert!(matches!(
            file.compile(&registry),
            Err(ConfigError::Graph(sluice_core::GraphError::CycleWithoutFeedback { .. }))
        ));
    }
}
