//! Composition file validation.
//!
//! Checks a [`CompositionFile`] against a [`NodeRegistry`] before any graph is
//! built, so that every problem in a hand-written file is reported at once
//! instead of one `GraphError` at a time.
//!
//! # Example
//!
//! ```rust
//! use sluice_config::{CompositionFile, NodeConfig, ValidationError};
//! use sluice_nodes::NodeRegistry;
//!
//! let file = CompositionFile::new("Broken")
//!     .with_node(NodeConfig::new("Fire", "fire_on_request"))
//!     .with_cable("Fire:fired", "Nowhere:value");
//!
//! let err = file.validate(&NodeRegistry::new()).unwrap_err();
//! assert!(matches!(err, ValidationError::UnknownNode { .. }));
//! ```

use std::collections::{HashMap, HashSet};

use sluice_core::graph::split_port_identifier;
use sluice_core::{Direction, PUBLISHED_INPUTS_NODE, PortDecl};
use sluice_nodes::NodeRegistry;
use thiserror::Error;

use crate::composition::CompositionFile;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown node class.
    #[error("node '{node}' has unknown class '{class}'")]
    UnknownClass {
        /// Name of the node.
        node: String,
        /// Class it asked for.
        class: String,
    },

    /// Two nodes share a name.
    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),

    /// A port identifier is not of the form `Node:port`.
    #[error("malformed port identifier '{0}' (expected 'Node:port')")]
    MalformedPortIdentifier(String),

    /// A port identifier names a node that does not exist.
    #[error("'{identifier}' refers to unknown node '{node}'")]
    UnknownNode {
        /// The full port identifier.
        identifier: String,
        /// The node part.
        node: String,
    },

    /// A port identifier names a port the node does not have.
    #[error("node '{node}' has no port '{port}'")]
    UnknownPort {
        /// Name of the node.
        node: String,
        /// Name of the missing port.
        port: String,
    },

    /// A cable endpoint has the wrong direction.
    #[error("cable from '{from}' to '{to}' must run from an output to an input")]
    WrongDirection {
        /// Source identifier.
        from: String,
        /// Destination identifier.
        to: String,
    },

    /// A policy override targets something other than a trigger port.
    #[error("node '{node}' has no trigger port '{port}' to set a policy on")]
    UnknownPolicyPort {
        /// Name of the node.
        node: String,
        /// Name of the port.
        port: String,
    },

    /// A constant targets something other than an input port.
    #[error("node '{node}' has no input port '{port}' to set a constant on")]
    UnknownConstantPort {
        /// Name of the node.
        node: String,
        /// Name of the port.
        port: String,
    },

    /// Two published ports share a name.
    #[error("duplicate published port '{0}'")]
    DuplicatePublishedName(String),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Port lists by node name, as resolved through the registry.
struct PortTable {
    nodes: HashMap<String, Vec<PortDecl>>,
}

impl PortTable {
    fn lookup<'a>(
        &'a self,
        identifier: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<&'a PortDecl> {
        let Some((node, port)) = split_port_identifier(identifier) else {
            errors.push(ValidationError::MalformedPortIdentifier(identifier.to_string()));
            return None;
        };
        let Some(ports) = self.nodes.get(node) else {
            errors.push(ValidationError::UnknownNode {
                identifier: identifier.to_string(),
                node: node.to_string(),
            });
            return None;
        };
        let found = ports.iter().find(|p| p.name == port);
        if found.is_none() {
            errors.push(ValidationError::UnknownPort {
                node: node.to_string(),
                port: port.to_string(),
            });
        }
        found
    }
}

/// Validate a composition file, collecting every problem.
///
/// Cycles are left to graph compilation.
pub fn validate_composition(
    file: &CompositionFile,
    registry: &NodeRegistry,
) -> ValidationResult<()> {
    let mut errors = Vec::new();
    let mut table = PortTable {
        nodes: HashMap::new(),
    };

    for node in &file.nodes {
        if node.name == PUBLISHED_INPUTS_NODE || table.nodes.contains_key(&node.name) {
            errors.push(ValidationError::DuplicateNode(node.name.clone()));
            continue;
        }
        let Some(ports) = registry.ports(&node.class) else {
            errors.push(ValidationError::UnknownClass {
                node: node.name.clone(),
                class: node.class.clone(),
            });
            continue;
        };

        for port in node.policies.keys() {
            if !ports.iter().any(|p| &p.name == port && p.trigger.is_some()) {
                errors.push(ValidationError::UnknownPolicyPort {
                    node: node.name.clone(),
                    port: port.clone(),
                });
            }
        }
        for port in node.constants.keys() {
            if !ports
                .iter()
                .any(|p| &p.name == port && p.direction == Direction::Input)
            {
                errors.push(ValidationError::UnknownConstantPort {
                    node: node.name.clone(),
                    port: port.clone(),
                });
            }
        }
        table.nodes.insert(node.name.clone(), ports);
    }

    if !file.published_inputs.is_empty() {
        let published = file
            .published_inputs
            .iter()
            .map(|p| {
                if p.data {
                    PortDecl::trigger(&p.name, sluice_core::SchedulingPolicy::Enqueue)
                } else {
                    PortDecl::event_trigger(&p.name, sluice_core::SchedulingPolicy::Enqueue)
                }
            })
            .collect();
        table
            .nodes
            .insert(PUBLISHED_INPUTS_NODE.to_string(), published);
    }

    for cable in &file.cables {
        let from = table.lookup(&cable.from, &mut errors);
        let to = table.lookup(&cable.to, &mut errors);
        if let (Some(from), Some(to)) = (from, to)
            && (from.direction != Direction::Output || to.direction != Direction::Input)
        {
            errors.push(ValidationError::WrongDirection {
                from: cable.from.clone(),
                to: cable.to.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for input in &file.published_inputs {
        if !seen.insert(input.name.as_str()) {
            errors.push(ValidationError::DuplicatePublishedName(input.name.clone()));
        }
    }
    let mut seen = HashSet::new();
    for output in &file.published_outputs {
        if !seen.insert(output.name.as_str()) {
            errors.push(ValidationError::DuplicatePublishedName(output.name.clone()));
        }
        table.lookup(&output.port, &mut errors);
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
