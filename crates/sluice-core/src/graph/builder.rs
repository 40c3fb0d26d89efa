//! Composition graph construction, validation, and schedule compilation.
//!
//! [`CompositionGraph`] is the mutable side of the two-object split: nodes,
//! ports, and cables are added here, then [`compile()`](CompositionGraph::compile)
//! validates the topology and produces an immutable [`GraphSchedule`].
//!
//! Validation happens once, at compile time. A composition that fails to
//! compile never reaches the runtime: cycles without a feedback cable and
//! feedback cables that close no cycle are rejected here, not while firing.

use std::cmp::Reverse;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thiserror::Error;

use super::cable::{Cable, CableId};
use super::node::{Node, NodeId, PUBLISHED_INPUTS_CLASS, PUBLISHED_INPUTS_NODE};
use super::port::{
    Direction, EventBlocking, PORT_SEPARATOR, Port, PortDecl, PortId, SchedulingPolicy,
    port_identifier, split_port_identifier,
};
use super::schedule::{GraphSchedule, PublishedPort, TriggerId, TriggerSchedule};
use crate::identifier::SEPARATOR;
use crate::value::PortValue;

/// Errors that can occur while building or compiling a composition graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No node with this name exists.
    #[error("node `{0}` not found")]
    NodeNotFound(String),
    /// The node id does not belong to this graph.
    #[error("{0} not found")]
    UnknownNode(NodeId),
    /// The port id does not belong to this graph.
    #[error("{0} not found")]
    UnknownPort(PortId),
    /// The node has no port with this name.
    #[error("node `{node}` has no port `{port}`")]
    PortNotFound {
        /// Node name.
        node: String,
        /// Requested port name.
        port: String,
    },
    /// A port identifier was not of the form `Node:port`.
    #[error("malformed port identifier `{0}` (expected `Node:port`)")]
    InvalidPortIdentifier(String),
    /// Node or port names must be non-empty and free of `:` and `/`.
    #[error("invalid name `{0}`")]
    InvalidName(String),
    /// Two nodes share a name.
    #[error("duplicate node name `{0}`")]
    DuplicateNodeName(String),
    /// Two ports of one node share a name.
    #[error("node `{node}` declares port `{port}` twice")]
    DuplicatePortName {
        /// Node name.
        node: String,
        /// Duplicated port name.
        port: String,
    },
    /// Two published ports share a name.
    #[error("duplicate published port `{0}`")]
    DuplicatePublishedPort(String),
    /// The connection is structurally invalid.
    #[error("invalid connection: {0}")]
    InvalidConnection(String),
    /// A cable between these ports already exists.
    #[error("cable from `{from}` to `{to}` already exists")]
    DuplicateCable {
        /// Source port identifier.
        from: String,
        /// Destination port identifier.
        to: String,
    },
    /// A constant can only be set on an input port.
    #[error("port `{0}` is not an input port")]
    NotAnInputPort(String),
    /// A scheduling policy can only be set on a trigger port.
    #[error("port `{0}` is not a trigger port")]
    NotATriggerPort(String),
    /// The graph has a cycle that no feedback cable breaks.
    #[error("cycle without a feedback cable through nodes: {}", .nodes.join(", "))]
    CycleWithoutFeedback {
        /// Names of the nodes left unsorted, in id order.
        nodes: Vec<String>,
    },
    /// A cable designated as feedback does not close a cycle.
    #[error("feedback cable from `{from}` to `{to}` does not close a cycle")]
    FeedbackClosesNoCycle {
        /// Source port identifier.
        from: String,
        /// Destination port identifier.
        to: String,
    },
}

/// Mutable composition graph.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add nodes with [`add_node()`](Self::add_node)
/// 3. Resolve ports with [`port()`](Self::port) or
///    [`port_by_identifier()`](Self::port_by_identifier)
/// 4. Wire them with [`connect()`](Self::connect) and
///    [`connect_feedback()`](Self::connect_feedback)
/// 5. Optionally publish ports, set constants, override trigger policies
/// 6. [`compile()`](Self::compile)
///
/// The graph is append-only. A live edit builds a fresh graph and compiles it;
/// the runtime carries state across with a
/// [`ScheduleDiff`](super::ScheduleDiff).
#[derive(Debug, Clone)]
pub struct CompositionGraph {
    name: String,
    nodes: Vec<Node>,
    ports: Vec<Port>,
    cables: Vec<Cable>,
    node_index: HashMap<String, NodeId>,
    published_inputs_node: Option<NodeId>,
    published_inputs: Vec<PublishedPort>,
    published_outputs: Vec<PublishedPort>,
}

impl CompositionGraph {
    /// Creates an empty graph.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
            ports: Vec::new(),
            cables: Vec::new(),
            node_index: HashMap::new(),
            published_inputs_node: None,
            published_inputs: Vec::new(),
            published_outputs: Vec::new(),
        }
    }

    /// Composition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Nodes and ports ---

    /// Adds a node of class `class` with the given port declarations.
    ///
    /// Returns an error if the name is taken, reserved, or malformed, or if two
    /// port declarations share a name.
    pub fn add_node(
        &mut self,
        name: &str,
        class: &str,
        stateful: bool,
        ports: &[PortDecl],
    ) -> Result<NodeId, GraphError> {
        validate_name(name)?;
        if name == PUBLISHED_INPUTS_NODE || self.node_index.contains_key(name) {
            return Err(GraphError::DuplicateNodeName(name.to_string()));
        }
        let mut seen = HashSet::new();
        for decl in ports {
            validate_name(&decl.name)?;
            if !seen.insert(decl.name.as_str()) {
                return Err(GraphError::DuplicatePortName {
                    node: name.to_string(),
                    port: decl.name.clone(),
                });
            }
        }

        let id = self.push_node(name, class, stateful);
        for decl in ports {
            self.push_port(id, decl);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_add_node: {name} ({class}) {id} with {} ports",
            ports.len()
        );
        Ok(id)
    }

    /// Looks up a port of `node` by name.
    pub fn port(&self, node: NodeId, name: &str) -> Result<PortId, GraphError> {
        let node = self.get_node(node)?;
        node.inputs
            .iter()
            .chain(node.outputs.iter())
            .copied()
            .find(|p| self.ports[p.0 as usize].name == name)
            .ok_or_else(|| GraphError::PortNotFound {
                node: node.name.clone(),
                port: name.to_string(),
            })
    }

    /// Looks up a port by its `Node:port` identifier.
    pub fn port_by_identifier(&self, identifier: &str) -> Result<PortId, GraphError> {
        let (node, port) = split_port_identifier(identifier)
            .ok_or_else(|| GraphError::InvalidPortIdentifier(identifier.to_string()))?;
        let node = self.node_by_name(node)?;
        self.port(node, port)
    }

    /// Looks up a node by name.
    pub fn node_by_name(&self, name: &str) -> Result<NodeId, GraphError> {
        self.node_index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))
    }

    /// Sets the constant value of an input port.
    pub fn set_constant(&mut self, port: PortId, value: PortValue) -> Result<(), GraphError> {
        let p = self.get_port_mut(port)?;
        if p.direction != Direction::Input {
            return Err(GraphError::NotAnInputPort(p.identifier.clone()));
        }
        p.initial = value;
        Ok(())
    }

    /// Overrides the scheduling policy of a trigger port.
    pub fn set_trigger_policy(
        &mut self,
        port: PortId,
        policy: SchedulingPolicy,
    ) -> Result<(), GraphError> {
        let p = self.get_port_mut(port)?;
        if p.trigger.is_none() {
            return Err(GraphError::NotATriggerPort(p.identifier.clone()));
        }
        p.trigger = Some(policy);
        Ok(())
    }

    // --- Cables ---

    /// Connects an output port to an input port.
    ///
    /// Returns the new cable's ID, or an error if:
    /// - Either port doesn't exist
    /// - `from` is not an output or `to` is not an input
    /// - The same cable already exists
    ///
    /// Cycles are detected by [`compile()`](Self::compile), since a later
    /// [`connect_feedback()`](Self::connect_feedback) may legitimately close one.
    pub fn connect(&mut self, from: PortId, to: PortId) -> Result<CableId, GraphError> {
        self.add_cable(from, to, false)
    }

    /// Connects an output port to an input port with a feedback cable.
    ///
    /// The cable must close a cycle; this is checked by
    /// [`compile()`](Self::compile).
    pub fn connect_feedback(&mut self, from: PortId, to: PortId) -> Result<CableId, GraphError> {
        self.add_cable(from, to, true)
    }

    fn add_cable(&mut self, from: PortId, to: PortId, feedback: bool) -> Result<CableId, GraphError> {
        self.validate_connection(from, to)?;

        let from_port = &self.ports[from.0 as usize];
        let to_port = &self.ports[to.0 as usize];
        if from_port
            .outgoing
            .iter()
            .any(|c| self.cables[c.0 as usize].to == to)
        {
            return Err(GraphError::DuplicateCable {
                from: from_port.identifier.clone(),
                to: to_port.identifier.clone(),
            });
        }

        let id = CableId(self.cables.len() as u32);
        self.cables.push(Cable {
            id,
            from,
            to,
            from_node: from_port.node,
            to_node: to_port.node,
            carries_data: from_port.data && to_port.data,
            feedback,
        });
        self.ports[from.0 as usize].outgoing.push(id);
        self.ports[to.0 as usize].incoming.push(id);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_connect: {} → {}{}",
            self.ports[from.0 as usize].identifier,
            self.ports[to.0 as usize].identifier,
            if feedback { " (feedback)" } else { "" }
        );
        Ok(id)
    }

    // --- Published ports ---

    /// Publishes a new input named `name`.
    ///
    /// Published inputs are output ports of the reserved `PublishedInputs`
    /// pseudo node; together they form one trigger fired by
    /// `firePublishedInputEvent`. Connect the returned port like any output.
    pub fn add_published_input(&mut self, name: &str, data: bool) -> Result<PortId, GraphError> {
        validate_name(name)?;
        if self.published_inputs.iter().any(|p| p.name == name) {
            return Err(GraphError::DuplicatePublishedPort(name.to_string()));
        }
        let node = match self.published_inputs_node {
            Some(node) => node,
            None => {
                let node = self.push_node(PUBLISHED_INPUTS_NODE, PUBLISHED_INPUTS_CLASS, false);
                self.published_inputs_node = Some(node);
                node
            }
        };
        let decl = if data {
            PortDecl::trigger(name, SchedulingPolicy::Enqueue)
        } else {
            PortDecl::event_trigger(name, SchedulingPolicy::Enqueue)
        };
        let port = self.push_port(node, &decl);
        self.published_inputs.push(PublishedPort {
            name: name.to_string(),
            port,
        });
        Ok(port)
    }

    /// Publishes an existing port as output `name`.
    pub fn add_published_output(&mut self, name: &str, port: PortId) -> Result<(), GraphError> {
        validate_name(name)?;
        self.get_port(port)?;
        if self.published_outputs.iter().any(|p| p.name == name) {
            return Err(GraphError::DuplicatePublishedPort(name.to_string()));
        }
        self.published_outputs.push(PublishedPort {
            name: name.to_string(),
            port,
        });
        Ok(())
    }

    // --- Introspection ---

    /// Number of nodes, including the published-inputs pseudo node.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of cables.
    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    // --- Compilation ---

    /// Validates the graph and compiles it into an immutable [`GraphSchedule`].
    ///
    /// # Errors
    ///
    /// - [`GraphError::CycleWithoutFeedback`] if the graph minus its feedback
    ///   cables still contains a cycle
    /// - [`GraphError::FeedbackClosesNoCycle`] if a feedback cable's
    ///   destination cannot reach its source through regular cables
    pub fn compile(&self) -> Result<Arc<GraphSchedule>, GraphError> {
        let topological_order = self.kahn_sort()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_sort: {} nodes in topo order", topological_order.len());

        for cable in self.cables.iter().filter(|c| c.feedback) {
            if cable.from_node != cable.to_node && !self.can_reach(cable.to_node, cable.from_node) {
                return Err(GraphError::FeedbackClosesNoCycle {
                    from: self.ports[cable.from.0 as usize].identifier.clone(),
                    to: self.ports[cable.to.0 as usize].identifier.clone(),
                });
            }
        }

        let mut rank = vec![0usize; self.nodes.len()];
        for (i, node) in topological_order.iter().enumerate() {
            rank[node.0 as usize] = i;
        }

        let mut triggers = Vec::new();
        let mut trigger_index = HashMap::new();
        let mut trigger_of_port = HashMap::new();
        let mut published_input_trigger = None;

        for node in &self.nodes {
            if node.is_published_inputs() {
                if node.outputs.is_empty() {
                    continue;
                }
                let id = TriggerId(triggers.len() as u32);
                let schedule = self.trigger_schedule(
                    id,
                    PUBLISHED_INPUTS_NODE.to_string(),
                    node.id,
                    node.outputs.clone(),
                    SchedulingPolicy::Enqueue,
                    true,
                    &topological_order,
                    &rank,
                );
                for &port in &node.outputs {
                    trigger_of_port.insert(port, id);
                }
                trigger_index.insert(schedule.identifier.clone(), id);
                published_input_trigger = Some(id);
                triggers.push(schedule);
                continue;
            }
            for &port_id in &node.outputs {
                let port = &self.ports[port_id.0 as usize];
                let Some(policy) = port.trigger else {
                    continue;
                };
                let id = TriggerId(triggers.len() as u32);
                let schedule = self.trigger_schedule(
                    id,
                    port.identifier.clone(),
                    node.id,
                    vec![port_id],
                    policy,
                    false,
                    &topological_order,
                    &rank,
                );
                trigger_of_port.insert(port_id, id);
                trigger_index.insert(schedule.identifier.clone(), id);
                triggers.push(schedule);
            }
        }

        #[cfg(feature = "tracing")]
        for t in &triggers {
            let names: Vec<&str> = t
                .order
                .iter()
                .map(|n| self.nodes[n.0 as usize].name.as_str())
                .collect();
            tracing::debug!(
                "  trigger {} ({}): [{}] feedback={}",
                t.identifier,
                t.policy.name(),
                names.join(", "),
                t.feedback.len()
            );
        }

        let port_index = self
            .ports
            .iter()
            .map(|p| (p.identifier.clone(), p.id))
            .collect();

        Ok(Arc::new(GraphSchedule {
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            ports: self.ports.clone(),
            cables: self.cables.clone(),
            topological_order,
            triggers,
            published_inputs: self.published_inputs.clone(),
            published_outputs: self.published_outputs.clone(),
            published_input_trigger,
            node_index: self.node_index.clone(),
            port_index,
            trigger_index,
            trigger_of_port,
            fingerprint: self.fingerprint(),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn trigger_schedule(
        &self,
        id: TriggerId,
        identifier: String,
        node: NodeId,
        origins: Vec<PortId>,
        policy: SchedulingPolicy,
        published: bool,
        topological_order: &[NodeId],
        rank: &[usize],
    ) -> TriggerSchedule {
        let reachable = self.reachable_from(&origins);
        let order: Vec<NodeId> = topological_order
            .iter()
            .copied()
            .filter(|n| reachable[n.0 as usize])
            .collect();

        let feedback: Vec<CableId> = self
            .cables
            .iter()
            .filter(|c| c.feedback && (reachable[c.from_node.0 as usize] || origins.contains(&c.from)))
            .map(|c| c.id)
            .collect();

        let mut feedback_targets: Vec<NodeId> = feedback
            .iter()
            .map(|c| self.cables[c.0 as usize].to_node)
            .collect();
        feedback_targets.sort_by_key(|n| rank[n.0 as usize]);
        feedback_targets.dedup();

        TriggerSchedule {
            id,
            identifier,
            node,
            origins,
            policy,
            order,
            feedback,
            feedback_targets,
            published,
        }
    }

    /// Marks every node an event from `origins` can reach through regular
    /// cables. Trigger ports of reached nodes are not followed: they only emit
    /// on their own firings.
    fn reachable_from(&self, origins: &[PortId]) -> Vec<bool> {
        let mut reached = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = Vec::new();

        for origin in origins {
            self.mark_destinations(*origin, &mut reached, &mut stack);
        }
        while let Some(current) = stack.pop() {
            for port_id in &self.nodes[current.0 as usize].outputs {
                if self.ports[port_id.0 as usize].trigger.is_none() {
                    self.mark_destinations(*port_id, &mut reached, &mut stack);
                }
            }
        }
        reached
    }

    fn mark_destinations(&self, port: PortId, reached: &mut [bool], stack: &mut Vec<NodeId>) {
        for cable_id in &self.ports[port.0 as usize].outgoing {
            let cable = &self.cables[cable_id.0 as usize];
            if cable.feedback {
                continue;
            }
            let idx = cable.to_node.0 as usize;
            if !reached[idx] {
                reached[idx] = true;
                stack.push(cable.to_node);
            }
        }
    }

    // --- Kahn's topological sort ---

    /// Kahn's algorithm over regular (non-feedback) cables.
    ///
    /// Ready nodes are taken lowest id first, so the order is deterministic
    /// for a given graph.
    fn kahn_sort(&self) -> Result<Vec<NodeId>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0u32; n];
        for cable in self.cables.iter().filter(|c| !c.feedback) {
            in_degree[cable.to_node.0 as usize] += 1;
        }

        let mut ready: BinaryHeap<Reverse<u32>> = (0..n as u32)
            .filter(|&i| in_degree[i as usize] == 0)
            .map(Reverse)
            .collect();
        let mut sorted = Vec::with_capacity(n);

        while let Some(Reverse(idx)) = ready.pop() {
            sorted.push(NodeId(idx));
            for cable in self.outgoing_cables(NodeId(idx)).filter(|c| !c.feedback) {
                let to = cable.to_node.0 as usize;
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    ready.push(Reverse(to as u32));
                }
            }
        }

        if sorted.len() != n {
            let nodes = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].name.clone())
                .collect();
            return Err(GraphError::CycleWithoutFeedback { nodes });
        }
        Ok(sorted)
    }

    /// DFS reachability check over regular cables: can `from` reach `to`?
    fn can_reach(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            let idx = current.0 as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.extend(
                self.outgoing_cables(current)
                    .filter(|c| !c.feedback)
                    .map(|c| c.to_node),
            );
        }
        false
    }

    fn outgoing_cables(&self, node: NodeId) -> impl Iterator<Item = &Cable> {
        self.nodes[node.0 as usize]
            .outputs
            .iter()
            .flat_map(|p| self.ports[p.0 as usize].outgoing.iter())
            .map(|c| &self.cables[c.0 as usize])
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        for node in &self.nodes {
            node.name.hash(&mut hasher);
            node.class.hash(&mut hasher);
        }
        for port in &self.ports {
            port.identifier.hash(&mut hasher);
            port.trigger.hash(&mut hasher);
            port.blocking.hash(&mut hasher);
        }
        for cable in &self.cables {
            cable.from.hash(&mut hasher);
            cable.to.hash(&mut hasher);
            cable.feedback.hash(&mut hasher);
        }
        hasher.finish()
    }

    // --- Internal helpers ---

    fn push_node(&mut self, name: &str, class: &str, stateful: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, name, class, stateful));
        self.node_index.insert(name.to_string(), id);
        id
    }

    fn push_port(&mut self, node: NodeId, decl: &PortDecl) -> PortId {
        let id = PortId(self.ports.len() as u32);
        let owner = &mut self.nodes[node.0 as usize];
        let slot = match decl.direction {
            Direction::Input => {
                owner.inputs.push(id);
                owner.inputs.len() - 1
            }
            Direction::Output => {
                owner.outputs.push(id);
                owner.outputs.len() - 1
            }
        };
        let blocking = match decl.direction {
            Direction::Input => decl.blocking,
            Direction::Output => EventBlocking::None,
        };
        let trigger = match decl.direction {
            Direction::Input => None,
            Direction::Output => decl.trigger,
        };
        self.ports.push(Port {
            id,
            node,
            slot,
            name: decl.name.clone(),
            identifier: port_identifier(&owner.name, &decl.name),
            direction: decl.direction,
            data: decl.data,
            blocking,
            trigger,
            initial: decl.default.clone(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        id
    }

    fn get_node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(GraphError::UnknownNode(id))
    }

    fn get_port(&self, id: PortId) -> Result<&Port, GraphError> {
        self.ports
            .get(id.0 as usize)
            .ok_or(GraphError::UnknownPort(id))
    }

    fn get_port_mut(&mut self, id: PortId) -> Result<&mut Port, GraphError> {
        self.ports
            .get_mut(id.0 as usize)
            .ok_or(GraphError::UnknownPort(id))
    }

    /// Validates structural constraints for a connection.
    fn validate_connection(&self, from: PortId, to: PortId) -> Result<(), GraphError> {
        let from_port = self.get_port(from)?;
        let to_port = self.get_port(to)?;

        if from_port.direction != Direction::Output {
            return Err(GraphError::InvalidConnection(format!(
                "cable source `{}` is not an output port",
                from_port.identifier
            )));
        }
        if to_port.direction != Direction::Input {
            return Err(GraphError::InvalidConnection(format!(
                "cable destination `{}` is not an input port",
                to_port.identifier
            )));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), GraphError> {
    if name.is_empty() || name.contains(PORT_SEPARATOR) || name.contains(SEPARATOR) {
        return Err(GraphError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_through(graph: &mut CompositionGraph, name: &str) -> NodeId {
        graph
            .add_node(
                name,
                "share_value",
                false,
                &[PortDecl::input("value"), PortDecl::output("same")],
            )
            .unwrap()
    }

    fn trigger(graph: &mut CompositionGraph, name: &str, policy: SchedulingPolicy) -> NodeId {
        graph
            .add_node(
                name,
                "fire_on_request",
                false,
                &[PortDecl::trigger("fired", policy)],
            )
            .unwrap()
    }

    fn wire(graph: &mut CompositionGraph, from: &str, to: &str) -> CableId {
        let from = graph.port_by_identifier(from).unwrap();
        let to = graph.port_by_identifier(to).unwrap();
        graph.connect(from, to).unwrap()
    }

    fn names(schedule: &GraphSchedule, order: &[NodeId]) -> Vec<String> {
        order
            .iter()
            .map(|n| schedule.node(*n).name().to_string())
            .collect()
    }

    // --- Construction ---

    #[test]
    fn test_add_nodes_and_ports() {
        let mut graph = CompositionGraph::new("t");
        let a = pass_through(&mut graph, "A");
        assert_eq!(graph.node_count(), 1);
        assert!(graph.port(a, "value").is_ok());
        assert!(graph.port_by_identifier("A:same").is_ok());
        assert!(matches!(
            graph.port(a, "missing"),
            Err(GraphError::PortNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_node_name_rejected() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        let result = graph.add_node("A", "x", false, &[]);
        assert!(matches!(result, Err(GraphError::DuplicateNodeName(_))));
    }

    #[test]
    fn test_reserved_and_malformed_names_rejected() {
        let mut graph = CompositionGraph::new("t");
        assert!(matches!(
            graph.add_node(PUBLISHED_INPUTS_NODE, "x", false, &[]),
            Err(GraphError::DuplicateNodeName(_))
        ));
        assert!(matches!(
            graph.add_node("a:b", "x", false, &[]),
            Err(GraphError::InvalidName(_))
        ));
        assert!(matches!(
            graph.add_node("a/b", "x", false, &[]),
            Err(GraphError::InvalidName(_))
        ));
    }

    #[test]
    fn test_duplicate_port_name_rejected() {
        let mut graph = CompositionGraph::new("t");
        let result = graph.add_node(
            "A",
            "x",
            false,
            &[PortDecl::input("v"), PortDecl::output("v")],
        );
        assert!(matches!(result, Err(GraphError::DuplicatePortName { .. })));
    }

    #[test]
    fn test_malformed_port_identifier() {
        let graph = CompositionGraph::new("t");
        assert!(matches!(
            graph.port_by_identifier("nocolon"),
            Err(GraphError::InvalidPortIdentifier(_))
        ));
        assert!(matches!(
            graph.port_by_identifier("Missing:port"),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_connect_direction_checked() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        pass_through(&mut graph, "B");
        let a_in = graph.port_by_identifier("A:value").unwrap();
        let b_in = graph.port_by_identifier("B:value").unwrap();
        let a_out = graph.port_by_identifier("A:same").unwrap();
        let b_out = graph.port_by_identifier("B:same").unwrap();

        assert!(matches!(
            graph.connect(a_in, b_in),
            Err(GraphError::InvalidConnection(_))
        ));
        assert!(matches!(
            graph.connect(a_out, b_out),
            Err(GraphError::InvalidConnection(_))
        ));
        assert!(matches!(
            graph.connect(a_out, PortId(99)),
            Err(GraphError::UnknownPort(_))
        ));
    }

    #[test]
    fn test_duplicate_cable_rejected() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        pass_through(&mut graph, "B");
        wire(&mut graph, "A:same", "B:value");
        let from = graph.port_by_identifier("A:same").unwrap();
        let to = graph.port_by_identifier("B:value").unwrap();
        assert!(matches!(
            graph.connect(from, to),
            Err(GraphError::DuplicateCable { .. })
        ));
    }

    #[test]
    fn test_cable_carries_data_only_between_data_ports() {
        let mut graph = CompositionGraph::new("t");
        graph
            .add_node("E", "x", false, &[PortDecl::event_output("done")])
            .unwrap();
        pass_through(&mut graph, "B");
        let cable = wire(&mut graph, "E:done", "B:value");
        let schedule = graph.compile().unwrap();
        assert!(!schedule.cable(cable).carries_data());
    }

    #[test]
    fn test_set_constant_requires_input() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        let input = graph.port_by_identifier("A:value").unwrap();
        let output = graph.port_by_identifier("A:same").unwrap();
        graph.set_constant(input, PortValue::Integer(5)).unwrap();
        assert!(matches!(
            graph.set_constant(output, PortValue::Integer(5)),
            Err(GraphError::NotAnInputPort(_))
        ));
        let schedule = graph.compile().unwrap();
        assert_eq!(
            schedule.port(input).initial_value(),
            &PortValue::Integer(5)
        );
    }

    #[test]
    fn test_set_trigger_policy() {
        let mut graph = CompositionGraph::new("t");
        trigger(&mut graph, "T", SchedulingPolicy::Enqueue);
        pass_through(&mut graph, "A");
        let fired = graph.port_by_identifier("T:fired").unwrap();
        let not_trigger = graph.port_by_identifier("A:same").unwrap();
        graph
            .set_trigger_policy(fired, SchedulingPolicy::Drop)
            .unwrap();
        assert!(matches!(
            graph.set_trigger_policy(not_trigger, SchedulingPolicy::Drop),
            Err(GraphError::NotATriggerPort(_))
        ));
        let schedule = graph.compile().unwrap();
        assert_eq!(schedule.triggers()[0].policy(), SchedulingPolicy::Drop);
    }

    // --- Compilation ---

    #[test]
    fn test_compile_scatter_gather_order() {
        let mut graph = CompositionGraph::new("t");
        trigger(&mut graph, "T", SchedulingPolicy::Enqueue);
        pass_through(&mut graph, "A");
        pass_through(&mut graph, "B");
        let c = graph
            .add_node(
                "C",
                "add",
                false,
                &[PortDecl::input("a"), PortDecl::input("b"), PortDecl::output("sum")],
            )
            .unwrap();
        wire(&mut graph, "T:fired", "A:value");
        wire(&mut graph, "T:fired", "B:value");
        wire(&mut graph, "A:same", "C:a");
        wire(&mut graph, "B:same", "C:b");

        let schedule = graph.compile().unwrap();
        let t = &schedule.triggers()[0];
        assert_eq!(t.identifier(), "T:fired");
        assert_eq!(names(&schedule, t.order()), vec!["A", "B", "C"]);
        assert!(t.reaches(c));
        assert!(t.feedback().is_empty());
    }

    #[test]
    fn test_trigger_order_only_reachable_nodes() {
        let mut graph = CompositionGraph::new("t");
        trigger(&mut graph, "T1", SchedulingPolicy::Enqueue);
        trigger(&mut graph, "T2", SchedulingPolicy::Drop);
        pass_through(&mut graph, "A");
        pass_through(&mut graph, "B");
        wire(&mut graph, "T1:fired", "A:value");
        wire(&mut graph, "T2:fired", "B:value");

        let schedule = graph.compile().unwrap();
        let t1 = schedule.trigger_by_identifier("T1:fired").unwrap();
        let t2 = schedule.trigger_by_identifier("T2:fired").unwrap();
        assert_eq!(names(&schedule, schedule.trigger(t1).order()), vec!["A"]);
        assert_eq!(names(&schedule, schedule.trigger(t2).order()), vec!["B"]);
        assert_eq!(schedule.trigger(t2).policy(), SchedulingPolicy::Drop);
        assert!(!schedule.trigger(t2).walks_nothing());
    }

    #[test]
    fn test_trigger_with_no_cables_has_empty_order() {
        let mut graph = CompositionGraph::new("t");
        trigger(&mut graph, "T", SchedulingPolicy::Drop);
        let schedule = graph.compile().unwrap();
        assert!(schedule.triggers()[0].order().is_empty());
        assert!(schedule.triggers()[0].walks_nothing());
    }

    #[test]
    fn test_trigger_ports_of_reached_nodes_not_followed() {
        let mut graph = CompositionGraph::new("t");
        trigger(&mut graph, "T", SchedulingPolicy::Enqueue);
        graph
            .add_node(
                "Spin",
                "spin_off_value",
                false,
                &[
                    PortDecl::input("value"),
                    PortDecl::trigger("spun_off", SchedulingPolicy::Enqueue),
                ],
            )
            .unwrap();
        pass_through(&mut graph, "After");
        wire(&mut graph, "T:fired", "Spin:value");
        wire(&mut graph, "Spin:spun_off", "After:value");

        let schedule = graph.compile().unwrap();
        let t = schedule.trigger_by_identifier("T:fired").unwrap();
        assert_eq!(names(&schedule, schedule.trigger(t).order()), vec!["Spin"]);
        let spin = schedule.trigger_by_identifier("Spin:spun_off").unwrap();
        assert_eq!(
            names(&schedule, schedule.trigger(spin).order()),
            vec!["After"]
        );
    }

    #[test]
    fn test_cycle_without_feedback_rejected() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        pass_through(&mut graph, "B");
        wire(&mut graph, "A:same", "B:value");
        wire(&mut graph, "B:same", "A:value");
        let result = graph.compile();
        assert!(matches!(
            result,
            Err(GraphError::CycleWithoutFeedback { ref nodes }) if nodes.len() == 2
        ));
    }

    #[test]
    fn test_feedback_cycle_compiles() {
        let mut graph = CompositionGraph::new("t");
        trigger(&mut graph, "T", SchedulingPolicy::Enqueue);
        let a = graph
            .add_node(
                "A",
                "add",
                true,
                &[PortDecl::input("a"), PortDecl::input("b"), PortDecl::output("sum")],
            )
            .unwrap();
        pass_through(&mut graph, "B");
        wire(&mut graph, "T:fired", "A:a");
        wire(&mut graph, "A:sum", "B:value");
        let from = graph.port_by_identifier("B:same").unwrap();
        let to = graph.port_by_identifier("A:b").unwrap();
        let fb = graph.connect_feedback(from, to).unwrap();

        let schedule = graph.compile().unwrap();
        let t = &schedule.triggers()[0];
        assert_eq!(names(&schedule, t.order()), vec!["A", "B"]);
        assert_eq!(t.feedback(), &[fb]);
        assert_eq!(t.feedback_targets(), &[a]);
        assert!(schedule.is_live_feedback(fb));
    }

    #[test]
    fn test_self_loop_feedback_compiles() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        let from = graph.port_by_identifier("A:same").unwrap();
        let to = graph.port_by_identifier("A:value").unwrap();
        graph.connect_feedback(from, to).unwrap();
        assert!(graph.compile().is_ok());
    }

    #[test]
    fn test_self_loop_without_feedback_rejected() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        wire(&mut graph, "A:same", "A:value");
        assert!(matches!(
            graph.compile(),
            Err(GraphError::CycleWithoutFeedback { .. })
        ));
    }

    #[test]
    fn test_feedback_closing_no_cycle_rejected() {
        let mut graph = CompositionGraph::new("t");
        pass_through(&mut graph, "A");
        pass_through(&mut graph, "B");
        let from = graph.port_by_identifier("A:same").unwrap();
        let to = graph.port_by_identifier("B:value").unwrap();
        graph.connect_feedback(from, to).unwrap();
        assert!(matches!(
            graph.compile(),
            Err(GraphError::FeedbackClosesNoCycle { .. })
        ));
    }

    #[test]
    fn test_published_inputs_form_one_trigger() {
        let mut graph = CompositionGraph::new("t");
        let x = graph.add_published_input("x", true).unwrap();
        let y = graph.add_published_input("y", true).unwrap();
        graph
            .add_node(
                "Add",
                "add",
                false,
                &[PortDecl::input("a"), PortDecl::input("b"), PortDecl::output("sum")],
            )
            .unwrap();
        let a = graph.port_by_identifier("Add:a").unwrap();
        let b = graph.port_by_identifier("Add:b").unwrap();
        graph.connect(x, a).unwrap();
        graph.connect(y, b).unwrap();
        let sum = graph.port_by_identifier("Add:sum").unwrap();
        graph.add_published_output("sum", sum).unwrap();

        assert!(matches!(
            graph.add_published_input("x", true),
            Err(GraphError::DuplicatePublishedPort(_))
        ));

        let schedule = graph.compile().unwrap();
        let trigger = schedule.published_input_trigger().unwrap();
        assert_eq!(schedule.trigger(trigger).origins(), &[x, y]);
        assert!(schedule.trigger(trigger).is_published());
        assert_eq!(schedule.trigger_of_port(y), Some(trigger));
        assert_eq!(
            schedule.port(x).identifier(),
            format!("{PUBLISHED_INPUTS_NODE}:x")
        );
        assert_eq!(schedule.published_output("sum").unwrap().port(), sum);
    }

    #[test]
    fn test_fingerprint_stable_for_same_graph() {
        let mut graph = CompositionGraph::new("t");
        trigger(&mut graph, "T", SchedulingPolicy::Enqueue);
        pass_through(&mut graph, "A");
        wire(&mut graph, "T:fired", "A:value");
        let first = graph.compile().unwrap();
        let second = graph.compile().unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());

        pass_through(&mut graph, "B");
        let third = graph.compile().unwrap();
        assert_ne!(first.fingerprint(), third.fingerprint());
    }
}
