//! Compiled schedule types.
//!
//! A [`GraphSchedule`] is the immutable snapshot produced by
//! [`CompositionGraph::compile()`](super::CompositionGraph::compile). Besides the
//! node, port, and cable tables it holds one [`TriggerSchedule`] per trigger:
//! the topological order of every node that trigger can reach, plus the
//! feedback cables that trigger's firings may send an event along.
//!
//! The schedule is shared with every worker via `Arc`; nothing in it changes
//! while a composition runs. A live edit produces a new schedule that the
//! runtime swaps in between firings.

use std::collections::HashMap;

use super::cable::{Cable, CableId};
use super::node::{Node, NodeId};
use super::port::{Port, PortId, SchedulingPolicy};

/// Identifier of a trigger (one entry of [`GraphSchedule::triggers()`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(pub(crate) u32);

impl TriggerId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TriggerId({})", self.0)
    }
}

/// Precomputed walk for one trigger.
#[derive(Debug, Clone)]
pub struct TriggerSchedule {
    pub(crate) id: TriggerId,
    pub(crate) identifier: String,
    pub(crate) node: NodeId,
    pub(crate) origins: Vec<PortId>,
    pub(crate) policy: SchedulingPolicy,
    pub(crate) order: Vec<NodeId>,
    pub(crate) feedback: Vec<CableId>,
    pub(crate) feedback_targets: Vec<NodeId>,
    pub(crate) published: bool,
}

impl TriggerSchedule {
    /// Trigger identifier.
    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// Name used to address this trigger: the trigger port's identifier, or
    /// `PublishedInputs` for the published-input trigger.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Node owning the trigger port(s).
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Ports a firing of this trigger starts from. A regular trigger has one;
    /// the published-input trigger has one per published input.
    pub fn origins(&self) -> &[PortId] {
        &self.origins
    }

    /// Admission policy.
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Nodes reachable from the origins, in execution order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Feedback cables whose source can send an event during a firing.
    pub fn feedback(&self) -> &[CableId] {
        &self.feedback
    }

    /// Destination nodes of [`feedback()`](Self::feedback), in execution order.
    pub fn feedback_targets(&self) -> &[NodeId] {
        &self.feedback_targets
    }

    /// `true` if a firing executes no node, forward or feedback.
    pub fn walks_nothing(&self) -> bool {
        self.order.is_empty() && self.feedback.is_empty()
    }

    /// `true` for the published-input trigger.
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Returns `true` if a firing of this trigger can reach `node`.
    pub fn reaches(&self, node: NodeId) -> bool {
        self.order.contains(&node)
    }
}

/// A published (externally visible) port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    pub(crate) name: String,
    pub(crate) port: PortId,
}

impl PublishedPort {
    /// Published name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port it aliases. For published inputs this is an output port of the
    /// published-inputs pseudo node.
    pub fn port(&self) -> PortId {
        self.port
    }
}

/// Immutable, compiled description of a composition.
#[derive(Debug)]
pub struct GraphSchedule {
    pub(crate) name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) ports: Vec<Port>,
    pub(crate) cables: Vec<Cable>,
    pub(crate) topological_order: Vec<NodeId>,
    pub(crate) triggers: Vec<TriggerSchedule>,
    pub(crate) published_inputs: Vec<PublishedPort>,
    pub(crate) published_outputs: Vec<PublishedPort>,
    pub(crate) published_input_trigger: Option<TriggerId>,
    pub(crate) node_index: HashMap<String, NodeId>,
    pub(crate) port_index: HashMap<String, PortId>,
    pub(crate) trigger_index: HashMap<String, TriggerId>,
    pub(crate) trigger_of_port: HashMap<PortId, TriggerId>,
    pub(crate) fingerprint: u64,
}

impl GraphSchedule {
    /// Composition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All nodes, indexed by [`NodeId::index()`].
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this schedule.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    /// Looks up a node by name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_index.get(name).copied()
    }

    /// All ports, indexed by [`PortId::index()`].
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Port by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this schedule.
    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.0 as usize]
    }

    /// Looks up a port by its `Node:port` identifier.
    pub fn port_by_identifier(&self, identifier: &str) -> Option<PortId> {
        self.port_index.get(identifier).copied()
    }

    /// All cables, indexed by [`CableId::index()`].
    pub fn cables(&self) -> &[Cable] {
        &self.cables
    }

    /// Cable by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this schedule.
    pub fn cable(&self, id: CableId) -> &Cable {
        &self.cables[id.0 as usize]
    }

    /// Every node in one global topological order (feedback cables ignored).
    pub fn topological_order(&self) -> &[NodeId] {
        &self.topological_order
    }

    /// All triggers.
    pub fn triggers(&self) -> &[TriggerSchedule] {
        &self.triggers
    }

    /// Trigger by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this schedule.
    pub fn trigger(&self, id: TriggerId) -> &TriggerSchedule {
        &self.triggers[id.0 as usize]
    }

    /// Looks up a trigger by identifier (see [`TriggerSchedule::identifier()`]).
    pub fn trigger_by_identifier(&self, identifier: &str) -> Option<TriggerId> {
        self.trigger_index.get(identifier).copied()
    }

    /// Trigger that fires from `port`, if `port` is a trigger or published
    /// input port.
    pub fn trigger_of_port(&self, port: PortId) -> Option<TriggerId> {
        self.trigger_of_port.get(&port).copied()
    }

    /// Published input ports.
    pub fn published_inputs(&self) -> &[PublishedPort] {
        &self.published_inputs
    }

    /// Published output ports.
    pub fn published_outputs(&self) -> &[PublishedPort] {
        &self.published_outputs
    }

    /// Published input by name.
    pub fn published_input(&self, name: &str) -> Option<&PublishedPort> {
        self.published_inputs.iter().find(|p| p.name == name)
    }

    /// Published output by name.
    pub fn published_output(&self, name: &str) -> Option<&PublishedPort> {
        self.published_outputs.iter().find(|p| p.name == name)
    }

    /// The trigger fired by published-input events, if any inputs are
    /// published.
    pub fn published_input_trigger(&self) -> Option<TriggerId> {
        self.published_input_trigger
    }

    /// Number of nodes, including the published-inputs pseudo node.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of cables.
    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    /// Hash over names, classes, ports, and cables. Two schedules compiled from
    /// the same graph within one process have equal fingerprints.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Returns `true` if some trigger can send an event along `cable`.
    pub fn is_live_feedback(&self, cable: CableId) -> bool {
        self.triggers.iter().any(|t| t.feedback.contains(&cable))
    }
}
