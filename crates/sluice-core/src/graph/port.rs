//! Port types.
//!
//! Node classes describe their ports with [`PortDecl`]; once a node is added to
//! a [`CompositionGraph`](super::CompositionGraph) each declaration becomes a
//! [`Port`] with a graph-wide [`PortId`] and the identifier `Node:port`.

use serde::{Deserialize, Serialize};

use super::cable::CableId;
use super::node::NodeId;
use crate::value::PortValue;

/// Separator between node name and port name in a port identifier.
pub const PORT_SEPARATOR: char = ':';

/// Unique identifier for a port in a composition graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub(crate) u32);

impl PortId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PortId({})", self.0)
    }
}

/// Port direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Receives events from cables.
    Input,
    /// Sends events along cables.
    Output,
}

/// How an input port treats an arriving event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventBlocking {
    /// The event reaches the node and passes through to all of its outputs.
    #[default]
    None,
    /// Data is stored, the event is absorbed.
    Wall,
    /// The event reaches the node, which decides per execution which outputs
    /// fire.
    Door,
}

/// Admission policy of a trigger port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingPolicy {
    /// Firings queue behind the one in flight; none are lost.
    #[default]
    Enqueue,
    /// A firing that arrives while another is in flight is discarded.
    Drop,
}

impl SchedulingPolicy {
    /// Lowercase name, as used in composition files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enqueue => "enqueue",
            Self::Drop => "drop",
        }
    }
}

/// Declaration of one port of a node class.
#[derive(Clone, Debug, PartialEq)]
pub struct PortDecl {
    /// Port name, unique within its node.
    pub name: String,
    /// Input or output.
    pub direction: Direction,
    /// `true` if the port carries data as well as events.
    pub data: bool,
    /// Blocking behavior (input ports only).
    pub blocking: EventBlocking,
    /// `Some` marks an output port as a trigger with the given policy.
    pub trigger: Option<SchedulingPolicy>,
    /// Initial value of the port.
    pub default: PortValue,
}

impl PortDecl {
    fn new(name: &str, direction: Direction, data: bool) -> Self {
        Self {
            name: name.to_string(),
            direction,
            data,
            blocking: EventBlocking::None,
            trigger: None,
            default: PortValue::None,
        }
    }

    /// Data-and-event input port.
    pub fn input(name: &str) -> Self {
        Self::new(name, Direction::Input, true)
    }

    /// Event-only input port.
    pub fn event_input(name: &str) -> Self {
        Self::new(name, Direction::Input, false)
    }

    /// Data-and-event output port.
    pub fn output(name: &str) -> Self {
        Self::new(name, Direction::Output, true)
    }

    /// Event-only output port.
    pub fn event_output(name: &str) -> Self {
        Self::new(name, Direction::Output, false)
    }

    /// Data-and-event trigger port.
    pub fn trigger(name: &str, policy: SchedulingPolicy) -> Self {
        Self {
            trigger: Some(policy),
            ..Self::new(name, Direction::Output, true)
        }
    }

    /// Event-only trigger port.
    pub fn event_trigger(name: &str, policy: SchedulingPolicy) -> Self {
        Self {
            trigger: Some(policy),
            ..Self::new(name, Direction::Output, false)
        }
    }

    /// Sets the blocking behavior.
    pub fn with_blocking(mut self, blocking: EventBlocking) -> Self {
        self.blocking = blocking;
        self
    }

    /// Sets the initial value.
    pub fn with_default(mut self, value: impl Into<PortValue>) -> Self {
        self.default = value.into();
        self
    }
}

/// A port of a node in a compiled graph.
#[derive(Debug, Clone)]
pub struct Port {
    pub(crate) id: PortId,
    pub(crate) node: NodeId,
    pub(crate) slot: usize,
    pub(crate) name: String,
    pub(crate) identifier: String,
    pub(crate) direction: Direction,
    pub(crate) data: bool,
    pub(crate) blocking: EventBlocking,
    pub(crate) trigger: Option<SchedulingPolicy>,
    pub(crate) initial: PortValue,
    pub(crate) outgoing: Vec<CableId>,
    pub(crate) incoming: Vec<CableId>,
}

impl Port {
    /// Port identifier.
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Owning node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Position among the owning node's inputs or outputs (per direction).
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Port name within its node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Composition-wide identifier, `Node:port`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Input or output.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// `true` for input ports.
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    /// `true` if the port carries data.
    pub fn is_data(&self) -> bool {
        self.data
    }

    /// Blocking behavior (always `None` for outputs).
    pub fn blocking(&self) -> EventBlocking {
        self.blocking
    }

    /// Scheduling policy, if this is a trigger port.
    pub fn trigger_policy(&self) -> Option<SchedulingPolicy> {
        self.trigger
    }

    /// `true` if this is a trigger port.
    pub fn is_trigger(&self) -> bool {
        self.trigger.is_some()
    }

    /// Value the port holds when its node is instantiated: the constant set on
    /// the graph, or the class default.
    pub fn initial_value(&self) -> &PortValue {
        &self.initial
    }

    /// Cables leaving this port.
    pub fn outgoing(&self) -> &[CableId] {
        &self.outgoing
    }

    /// Cables arriving at this port.
    pub fn incoming(&self) -> &[CableId] {
        &self.incoming
    }
}

/// Joins a node name and port name into a port identifier.
pub fn port_identifier(node: &str, port: &str) -> String {
    format!("{node}{PORT_SEPARATOR}{port}")
}

/// Splits a `Node:port` identifier into its node and port names.
pub fn split_port_identifier(identifier: &str) -> Option<(&str, &str)> {
    let (node, port) = identifier.split_once(PORT_SEPARATOR)?;
    if node.is_empty() || port.is_empty() || port.contains(PORT_SEPARATOR) {
        return None;
    }
    Some((node, port))
}
