//! Node executor: per-node state and the execution critical section.
//!
//! Every node owns a [`NodeSlot`], a mutex around its behavior and current
//! port values. Executing a node locks its slot, runs the behavior, collects
//! what it emitted, and releases the lock before anything is delivered
//! downstream. A propagating worker therefore never holds two node locks at
//! once, so concurrent triggers sharing nodes serialize per node and cannot
//! deadlock.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use sluice_core::{
    CompositionIdentifier, EventBlocking, GraphSchedule, Node, NodeId, PortId, PortValue,
};

use crate::error::NodeError;
use crate::event::{Event, Pass};
use crate::node::{NodeBehavior, NodeContext, OutputRequest};

/// Behavior and port values of one node.
pub(crate) struct NodeState {
    pub behavior: Box<dyn NodeBehavior>,
    pub inputs: Vec<PortValue>,
    pub outputs: Vec<PortValue>,
}

/// A node's critical section.
pub(crate) struct NodeSlot {
    state: Mutex<NodeState>,
}

impl NodeSlot {
    /// Creates a slot with every port at its initial value.
    pub fn new(behavior: Box<dyn NodeBehavior>, node: &Node, schedule: &GraphSchedule) -> Self {
        let initial = |ports: &[PortId]| {
            ports
                .iter()
                .map(|p| schedule.port(*p).initial_value().clone())
                .collect()
        };
        Self {
            state: Mutex::new(NodeState {
                behavior,
                inputs: initial(node.inputs()),
                outputs: initial(node.outputs()),
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock()
    }

    pub fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, NodeState>> {
        self.state.try_lock_for(timeout)
    }

    /// Resizes port storage to match `node` after a schedule replacement.
    /// Existing values are kept; new ports start at their initial value.
    pub fn conform(&self, node: &Node, schedule: &GraphSchedule) {
        let mut state = self.lock();
        conform_values(&mut state.inputs, node.inputs(), schedule);
        conform_values(&mut state.outputs, node.outputs(), schedule);
    }
}

fn conform_values(values: &mut Vec<PortValue>, ports: &[PortId], schedule: &GraphSchedule) {
    if values.len() > ports.len() {
        values.truncate(ports.len());
    }
    for port in &ports[values.len()..] {
        values.push(schedule.port(*port).initial_value().clone());
    }
}

/// One output port's contribution after an execution.
#[derive(Debug)]
pub(crate) struct Emission {
    pub port: PortId,
    pub value: PortValue,
    pub event: bool,
    pub data: bool,
}

/// Everything one execution produced.
#[derive(Debug, Default)]
pub(crate) struct Execution {
    pub emissions: Vec<Emission>,
    pub spin_offs: Vec<(PortId, PortValue)>,
    pub feedback_snapshots: Vec<(PortId, PortValue)>,
}

/// Executes `node_id` inside its critical section.
///
/// `received` is indexed by [`PortId`] and tells which inputs got an event
/// this firing (this pass). On the forward pass, outputs that source a
/// feedback cable are snapshotted before the behavior runs so the feedback
/// pass can deliver their pre-firing values.
///
/// Emission rule: an output sends an event if the node received an event on a
/// non-blocking input (pass-through) or the behavior asked for one. Trigger
/// ports never emit from execution.
#[allow(clippy::too_many_arguments)]
pub(crate) fn execute(
    slot: &NodeSlot,
    schedule: &GraphSchedule,
    composition: &CompositionIdentifier,
    node_id: NodeId,
    event: Event,
    pass: Pass,
    received: &[bool],
) -> Result<Execution, NodeError> {
    let node = schedule.node(node_id);
    let received_local: Vec<bool> = node
        .inputs()
        .iter()
        .map(|p| received[p.index() as usize])
        .collect();
    let mut requests = vec![OutputRequest::default(); node.outputs().len()];
    let mut execution = Execution::default();

    let mut guard = slot.lock();
    let NodeState {
        behavior,
        inputs,
        outputs,
    } = &mut *guard;

    if pass == Pass::Forward {
        for (slot_idx, port_id) in node.outputs().iter().enumerate() {
            let sources_feedback = schedule
                .port(*port_id)
                .outgoing()
                .iter()
                .any(|c| schedule.cable(*c).is_feedback());
            if sources_feedback {
                execution
                    .feedback_snapshots
                    .push((*port_id, outputs[slot_idx].clone()));
            }
        }
    }

    let mut ctx = NodeContext {
        schedule,
        node,
        composition,
        inputs,
        received: &received_local,
        outputs,
        requests: &mut requests,
        spin_offs: &mut execution.spin_offs,
        event,
        pass,
    };
    behavior.execute(&mut ctx)?;

    let pass_through = node
        .inputs()
        .iter()
        .zip(&received_local)
        .any(|(p, r)| *r && schedule.port(*p).blocking() == EventBlocking::None);

    for (slot_idx, port_id) in node.outputs().iter().enumerate() {
        let port = schedule.port(*port_id);
        if port.is_trigger() {
            continue;
        }
        let request = requests[slot_idx];
        let sends_event = pass_through || request.fire;
        if !sends_event && !request.wrote {
            continue;
        }
        execution.emissions.push(Emission {
            port: *port_id,
            value: outputs[slot_idx].clone(),
            event: sends_event,
            data: request.wrote || (sends_event && port.is_data()),
        });
    }
    drop(guard);

    Ok(execution)
}
