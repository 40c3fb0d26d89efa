//! Node classes, node behaviors, and the execution context.
//!
//! A [`NodeClass`] describes a kind of node (its ports) and creates one
//! [`NodeBehavior`] per node instance. The behavior owns the node's persistent
//! instance data; the composition instance owns the behavior and only touches
//! it inside the node's critical section.
//!
//! During execution a behavior sees a [`NodeContext`]: current input values,
//! which inputs received an event this firing, and methods to write outputs,
//! open a door ([`fire()`](NodeContext::fire)), or spin off a new firing.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use sluice_core::{
    CompositionIdentifier, GraphSchedule, Node, PortDecl, PortId, PortValue,
};

use crate::error::{ControlError, NodeError};
use crate::event::{Admission, Event, Pass};
use crate::instance::{InstanceCore, RuntimeEnv};

/// Metadata describing a node class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    /// Unique class identifier (lowercase, no spaces).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Brief description.
    pub description: String,
    /// Whether instances keep persistent data between executions.
    pub stateful: bool,
}

/// A kind of node.
pub trait NodeClass: Send + Sync {
    /// Class metadata.
    fn descriptor(&self) -> NodeDescriptor;

    /// Port declarations, in order.
    fn ports(&self) -> Vec<PortDecl>;

    /// Creates the behavior (and persistent instance data) for one node.
    fn instantiate(&self, ctx: &InstantiateContext<'_>) -> Result<Box<dyn NodeBehavior>, NodeError>;
}

/// Per-node logic and instance data.
///
/// Only `execute` is required. The trigger hooks bracket the period during
/// which the node may fire its own trigger ports from other threads (timers,
/// I/O callbacks); `fini` runs once when the instance is torn down or the node
/// is removed by a schedule replacement.
pub trait NodeBehavior: Send {
    /// Runs the node's transfer function for one firing.
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError>;

    /// The composition started or was unpaused.
    fn start_triggers(&mut self, _triggers: &TriggerHandles) {}

    /// The composition was paused or is stopping.
    fn stop_triggers(&mut self) {}

    /// The node is being destroyed.
    fn fini(&mut self) {}
}

/// Resolves node class identifiers.
pub trait NodeClassResolver: Send + Sync {
    /// Returns the class registered under `id`.
    fn resolve(&self, id: &str) -> Option<Arc<dyn NodeClass>>;
}

impl NodeClassResolver for HashMap<String, Arc<dyn NodeClass>> {
    fn resolve(&self, id: &str) -> Option<Arc<dyn NodeClass>> {
        self.get(id).cloned()
    }
}

/// Information available while instantiating a node.
pub struct InstantiateContext<'a> {
    pub(crate) node_name: &'a str,
    pub(crate) composition: &'a CompositionIdentifier,
    pub(crate) env: &'a Arc<RuntimeEnv>,
    pub(crate) schedule: &'a GraphSchedule,
    pub(crate) node: &'a Node,
}

impl InstantiateContext<'_> {
    /// Name of the node being created.
    pub fn node_name(&self) -> &str {
        self.node_name
    }

    /// Composition the node belongs to.
    pub fn composition(&self) -> &CompositionIdentifier {
        self.composition
    }

    /// Initial value of input port `name`: the class default or a constant
    /// set on the graph.
    pub fn initial_input(&self, name: &str) -> Option<&PortValue> {
        self.node
            .inputs()
            .iter()
            .map(|p| self.schedule.port(*p))
            .find(|p| p.name() == name)
            .map(|p| p.initial_value())
    }
}

/// Handle a node keeps to fire one of its own trigger ports.
///
/// Holds only a weak reference to the instance: firing after the instance is
/// gone returns [`ControlError::Stopped`].
#[derive(Clone)]
pub struct TriggerHandle {
    core: Weak<InstanceCore>,
    port: String,
}

impl std::fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl TriggerHandle {
    /// Identifier of the trigger port, `Node:port`.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Requests a firing. `None` keeps the port's current value.
    pub fn fire(&self, value: Option<PortValue>) -> Result<Admission, ControlError> {
        let core = self.core.upgrade().ok_or(ControlError::Stopped)?;
        core.fire_port(&self.port, value)
    }
}

/// The trigger handles of one node, keyed by port name.
#[derive(Debug, Clone, Default)]
pub struct TriggerHandles {
    handles: HashMap<String, TriggerHandle>,
}

impl TriggerHandles {
    pub(crate) fn for_node(core: &Arc<InstanceCore>, schedule: &GraphSchedule, node: &Node) -> Self {
        let handles = node
            .outputs()
            .iter()
            .map(|p| schedule.port(*p))
            .filter(|p| p.is_trigger())
            .map(|p| {
                (
                    p.name().to_string(),
                    TriggerHandle {
                        core: Arc::downgrade(core),
                        port: p.identifier().to_string(),
                    },
                )
            })
            .collect();
        Self { handles }
    }

    /// Handle for the trigger port named `name`.
    pub fn get(&self, name: &str) -> Option<&TriggerHandle> {
        self.handles.get(name)
    }

    /// Fires the trigger port named `name`.
    pub fn fire(&self, name: &str, value: Option<PortValue>) -> Result<Admission, ControlError> {
        self.handles
            .get(name)
            .ok_or_else(|| ControlError::UnknownTrigger(name.to_string()))?
            .fire(value)
    }

    /// `true` if the node has no trigger ports.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// What execution asked of one output port.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct OutputRequest {
    /// New data was written.
    pub wrote: bool,
    /// An event was requested.
    pub fire: bool,
}

/// View of one node during one execution.
pub struct NodeContext<'a> {
    pub(crate) schedule: &'a GraphSchedule,
    pub(crate) node: &'a Node,
    pub(crate) composition: &'a CompositionIdentifier,
    pub(crate) inputs: &'a [PortValue],
    pub(crate) received: &'a [bool],
    pub(crate) outputs: &'a mut [PortValue],
    pub(crate) requests: &'a mut [OutputRequest],
    pub(crate) spin_offs: &'a mut Vec<(PortId, PortValue)>,
    pub(crate) event: Event,
    pub(crate) pass: Pass,
}

impl NodeContext<'_> {
    fn input_slot(&self, name: &str) -> Option<usize> {
        self.node
            .inputs()
            .iter()
            .position(|p| self.schedule.port(*p).name() == name)
    }

    fn output_slot(&self, name: &str) -> Result<usize, NodeError> {
        self.node
            .outputs()
            .iter()
            .position(|p| self.schedule.port(*p).name() == name)
            .ok_or_else(|| NodeError::UnknownPort(name.to_string()))
    }

    fn writable_slot(&self, name: &str) -> Result<usize, NodeError> {
        let slot = self.output_slot(name)?;
        if self.schedule.port(self.node.outputs()[slot]).is_trigger() {
            return Err(NodeError::TriggerMismatch(name.to_string()));
        }
        Ok(slot)
    }

    /// Name of the executing node.
    pub fn node_name(&self) -> &str {
        self.node.name()
    }

    /// Composition the node belongs to.
    pub fn composition(&self) -> &CompositionIdentifier {
        self.composition
    }

    /// The firing being propagated.
    pub fn event(&self) -> Event {
        self.event
    }

    /// Forward or feedback pass.
    pub fn pass(&self) -> Pass {
        self.pass
    }

    /// Current value of input port `name`.
    pub fn input(&self, name: &str) -> Result<&PortValue, NodeError> {
        self.input_slot(name)
            .map(|slot| &self.inputs[slot])
            .ok_or_else(|| NodeError::UnknownPort(name.to_string()))
    }

    /// Current value of input `name` as an integer.
    pub fn input_integer(&self, name: &str) -> Result<i64, NodeError> {
        let value = self.input(name)?;
        value
            .as_integer()
            .ok_or_else(|| NodeError::type_mismatch(name, "integer", value.type_name()))
    }

    /// Current value of input `name` as a real number.
    pub fn input_real(&self, name: &str) -> Result<f64, NodeError> {
        let value = self.input(name)?;
        value
            .as_real()
            .ok_or_else(|| NodeError::type_mismatch(name, "real", value.type_name()))
    }

    /// `true` if input `name` received an event this firing.
    ///
    /// Wall inputs never report an event.
    pub fn received_event(&self, name: &str) -> bool {
        self.input_slot(name).is_some_and(|slot| self.received[slot])
    }

    /// Current value of output port `name`.
    pub fn output(&self, name: &str) -> Result<&PortValue, NodeError> {
        let slot = self.output_slot(name)?;
        Ok(&self.outputs[slot])
    }

    /// Writes `value` to output `name` and sends an event from it.
    pub fn set_output(&mut self, name: &str, value: impl Into<PortValue>) -> Result<(), NodeError> {
        let slot = self.writable_slot(name)?;
        self.outputs[slot] = value.into();
        self.requests[slot].wrote = true;
        self.requests[slot].fire = true;
        Ok(())
    }

    /// Writes `value` to output `name` without requesting an event.
    ///
    /// The value travels with the next event leaving the port.
    pub fn set_output_data(
        &mut self,
        name: &str,
        value: impl Into<PortValue>,
    ) -> Result<(), NodeError> {
        let slot = self.writable_slot(name)?;
        self.outputs[slot] = value.into();
        self.requests[slot].wrote = true;
        Ok(())
    }

    /// Sends an event from output `name` with its current value.
    ///
    /// This is how a node with door inputs lets an event through.
    pub fn fire(&mut self, name: &str) -> Result<(), NodeError> {
        let slot = self.writable_slot(name)?;
        self.requests[slot].fire = true;
        Ok(())
    }

    /// Requests an independent firing of this node's trigger port `name`.
    ///
    /// The firing is submitted after this execution leaves its critical
    /// section and is admitted under that trigger's policy.
    pub fn spin_off(&mut self, name: &str, value: impl Into<PortValue>) -> Result<(), NodeError> {
        let slot = self.output_slot(name)?;
        let port = self.node.outputs()[slot];
        if !self.schedule.port(port).is_trigger() {
            return Err(NodeError::TriggerMismatch(name.to_string()));
        }
        self.spin_offs.push((port, value.into()));
        Ok(())
    }
}
