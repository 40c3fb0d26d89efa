//! Graph node types.
//!
//! A [`Node`] is one instance of a node class inside a composition. It owns a
//! list of input and output ports; its behavior (and any persistent instance
//! data) lives in the runtime, keyed by [`NodeId`].

use super::port::PortId;

/// Reserved name of the pseudo node that owns the published input ports.
pub const PUBLISHED_INPUTS_NODE: &str = "PublishedInputs";

/// Class identifier of the published-inputs pseudo node.
pub const PUBLISHED_INPUTS_CLASS: &str = "sluice.published_inputs";

/// Unique identifier for a node in a composition graph.
///
/// Node IDs are assigned sequentially and never reused within a graph. They
/// index directly into [`GraphSchedule::nodes()`](super::GraphSchedule::nodes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A node instance in a composition.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) class: String,
    pub(crate) stateful: bool,
    pub(crate) inputs: Vec<PortId>,
    pub(crate) outputs: Vec<PortId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: &str, class: &str, stateful: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            class: class.to_string(),
            stateful,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Node identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Unique node name within the composition.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node class identifier, resolved by the runtime to a behavior.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Whether the node keeps persistent instance data between executions.
    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    /// Input ports, in declaration order.
    pub fn inputs(&self) -> &[PortId] {
        &self.inputs
    }

    /// Output ports (including trigger ports), in declaration order.
    pub fn outputs(&self) -> &[PortId] {
        &self.outputs
    }

    /// Returns `true` for the published-inputs pseudo node.
    pub fn is_published_inputs(&self) -> bool {
        self.class == PUBLISHED_INPUTS_CLASS
    }
}
