//! Event propagation for one firing.
//!
//! A firing starts at the trigger's origin ports and walks the trigger's
//! precomputed order. A node executes if at least one of its inputs received
//! the event; wall inputs take the data but absorb the event. After the
//! forward walk, feedback cables whose source sent an event deliver the value
//! their source held *before* the firing, and the destination nodes execute
//! once more in a data-only feedback pass.

use std::collections::HashMap;
use std::sync::Arc;

use sluice_core::{Cable, EventBlocking, GraphSchedule, PortId, PortValue, TriggerSchedule};

use crate::error::NodeError;
use crate::event::{Event, Pass};
use crate::executor::{self, Emission, NodeSlot};
use crate::stats::InstanceStats;
use crate::telemetry::TelemetryEmitter;

/// A node's transfer function failed.
#[derive(Debug)]
pub(crate) struct NodeFailure {
    pub node: String,
    pub error: NodeError,
}

impl std::fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node `{}` failed: {}", self.node, self.error)
    }
}

/// What one firing did.
#[derive(Debug, Default)]
pub(crate) struct FiringReport {
    pub executions: u64,
    pub feedback_executions: u64,
    /// Per published output: an event passed through it.
    pub published_output_events: Vec<bool>,
}

impl FiringReport {
    pub fn any_published_output_event(&self) -> bool {
        self.published_output_events.iter().any(|e| *e)
    }
}

/// Borrowed view of one generation of an instance.
pub(crate) struct Propagator<'a> {
    pub schedule: &'a GraphSchedule,
    pub slots: &'a [Arc<NodeSlot>],
    pub telemetry: &'a TelemetryEmitter,
    pub stats: &'a InstanceStats,
}

struct Walk {
    /// Indexed by input port: the input received an event this pass.
    received: Vec<bool>,
    /// Indexed by output port: the port sent an event this firing.
    sent: Vec<bool>,
    /// Pre-firing values of feedback sources.
    snapshots: HashMap<PortId, PortValue>,
}

impl Propagator<'_> {
    fn slot(&self, port: PortId) -> &NodeSlot {
        let node = self.schedule.port(port).node();
        &self.slots[node.index() as usize]
    }

    /// Runs one firing of `trigger` to completion.
    ///
    /// `spin_off` is called for every spin-off request, after the requesting
    /// node has left its critical section.
    pub fn run(
        &self,
        trigger: &TriggerSchedule,
        event: Event,
        origins: &[(PortId, Option<PortValue>)],
        spin_off: &mut dyn FnMut(PortId, PortValue),
    ) -> Result<FiringReport, NodeFailure> {
        let port_count = self.schedule.ports().len();
        let mut walk = Walk {
            received: vec![false; port_count],
            sent: vec![false; port_count],
            snapshots: HashMap::new(),
        };
        let mut report = FiringReport::default();

        for (port_id, value) in origins {
            self.fire_origin(&mut walk, *port_id, value.as_ref());
        }

        // --- Forward pass ---
        for &node_id in trigger.order() {
            let node = self.schedule.node(node_id);
            if !node
                .inputs()
                .iter()
                .any(|p| walk.received[p.index() as usize])
            {
                continue;
            }

            self.telemetry.node_started(node.name());
            let execution = executor::execute(
                &self.slots[node_id.index() as usize],
                self.schedule,
                self.telemetry.composition(),
                node_id,
                event,
                Pass::Forward,
                &walk.received,
            )
            .map_err(|error| NodeFailure {
                node: node.name().to_string(),
                error,
            })?;
            InstanceStats::bump(&self.stats.node_executions);
            report.executions += 1;

            for (port, value) in execution.feedback_snapshots {
                walk.snapshots.entry(port).or_insert(value);
            }
            for emission in &execution.emissions {
                self.emit(&mut walk, emission);
            }
            self.telemetry.node_finished(node.name());

            for (port, value) in execution.spin_offs {
                spin_off(port, value);
            }
        }

        for published in self.schedule.published_outputs() {
            let port = self.schedule.port(published.port());
            let index = port.id().index() as usize;
            let event = if port.is_input() {
                walk.received[index]
            } else {
                walk.sent[index]
            };
            report.published_output_events.push(event);
        }

        // --- Feedback pass ---
        if !trigger.feedback().is_empty() {
            report.feedback_executions = self.feedback_pass(trigger, event, &walk)?;
            report.executions += report.feedback_executions;
        }

        tracing::trace!(
            "firing {} #{}: {} executions ({} feedback)",
            trigger.identifier(),
            event.sequence(),
            report.executions,
            report.feedback_executions
        );

        Ok(report)
    }

    fn fire_origin(&self, walk: &mut Walk, port_id: PortId, value: Option<&PortValue>) {
        let port = self.schedule.port(port_id);
        let current = {
            let mut state = self.slot(port_id).lock();
            let stored = &mut state.outputs[port.slot()];
            if port
                .outgoing()
                .iter()
                .any(|c| self.schedule.cable(*c).is_feedback())
            {
                walk.snapshots.insert(port_id, stored.clone());
            }
            if let Some(value) = value {
                *stored = value.clone();
            }
            stored.clone()
        };
        let data = value.is_some() || port.is_data();
        self.telemetry
            .port_updated(port.identifier(), true, data, &current);
        walk.sent[port_id.index() as usize] = true;

        for cable in port.outgoing() {
            let cable = self.schedule.cable(*cable);
            if !cable.is_feedback() {
                self.deliver(cable, &current, data, true, &mut walk.received);
            }
        }
    }

    fn emit(&self, walk: &mut Walk, emission: &Emission) {
        let port = self.schedule.port(emission.port);
        self.telemetry.port_updated(
            port.identifier(),
            emission.event,
            emission.data,
            &emission.value,
        );
        if !emission.event {
            return;
        }
        walk.sent[emission.port.index() as usize] = true;
        for cable in port.outgoing() {
            let cable = self.schedule.cable(*cable);
            if !cable.is_feedback() {
                self.deliver(cable, &emission.value, emission.data, true, &mut walk.received);
            }
        }
    }

    /// Moves `value` (if `data`) and the event (if `event`) along `cable`.
    fn deliver(
        &self,
        cable: &Cable,
        value: &PortValue,
        data: bool,
        event: bool,
        received: &mut [bool],
    ) {
        let to = self.schedule.port(cable.to());
        let writes = data && cable.carries_data();
        if writes {
            self.slot(cable.to()).lock().inputs[to.slot()] = value.clone();
        }
        let passes = event && to.blocking() != EventBlocking::Wall;
        if passes {
            received[cable.to().index() as usize] = true;
        }
        if writes || passes {
            self.telemetry
                .port_updated(to.identifier(), passes, writes, value);
        }
    }

    fn feedback_pass(
        &self,
        trigger: &TriggerSchedule,
        event: Event,
        walk: &Walk,
    ) -> Result<u64, NodeFailure> {
        let mut received = vec![false; self.schedule.ports().len()];
        for cable in trigger.feedback() {
            let cable = self.schedule.cable(*cable);
            if !walk.sent[cable.from().index() as usize] {
                continue;
            }
            let Some(value) = walk.snapshots.get(&cable.from()) else {
                continue;
            };
            self.deliver(cable, value, true, true, &mut received);
        }

        let mut executions = 0;
        for &node_id in trigger.feedback_targets() {
            let node = self.schedule.node(node_id);
            if !node.inputs().iter().any(|p| received[p.index() as usize]) {
                continue;
            }
            self.telemetry.node_started(node.name());
            let execution = executor::execute(
                &self.slots[node_id.index() as usize],
                self.schedule,
                self.telemetry.composition(),
                node_id,
                event,
                Pass::Feedback,
                &received,
            )
            .map_err(|error| NodeFailure {
                node: node.name().to_string(),
                error,
            })?;
            InstanceStats::bump(&self.stats.node_executions);
            InstanceStats::bump(&self.stats.feedback_executions);
            executions += 1;

            // Unlike `emit`, data moves downstream here with no event behind it.
            for emission in execution.emissions.iter().filter(|e| e.data) {
                let port = self.schedule.port(emission.port);
                self.telemetry
                    .port_updated(port.identifier(), false, true, &emission.value);
                for cable in port.outgoing() {
                    let cable = self.schedule.cable(*cable);
                    if !cable.is_feedback() {
                        self.deliver(cable, &emission.value, true, false, &mut received);
                    }
                }
            }
            self.telemetry.node_finished(node.name());
        }
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use crate::node::{NodeBehavior, NodeContext};
    use crate::telemetry::TelemetryHub;
    use sluice_core::{CompositionGraph, CompositionIdentifier, PortDecl, SchedulingPolicy};

    /// Counts executions and forwards its input.
    struct Relay;

    impl NodeBehavior for Relay {
        fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
            let value = ctx.input("in")?.clone();
            ctx.set_output_data("out", value)
        }
    }

    struct Source;

    impl NodeBehavior for Source {
        fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
            Ok(())
        }
    }

    fn relay_ports() -> Vec<PortDecl> {
        vec![PortDecl::input("in"), PortDecl::output("out")]
    }

    fn wire(graph: &mut CompositionGraph, from: &str, to: &str) {
        let from = graph.port_by_identifier(from).unwrap();
        let to = graph.port_by_identifier(to).unwrap();
        graph.connect(from, to).unwrap();
    }

    fn build(graph: &CompositionGraph) -> (Arc<GraphSchedule>, Vec<Arc<NodeSlot>>) {
        let schedule = graph.compile().unwrap();
        let slots = schedule
            .nodes()
            .iter()
            .map(|n| {
                let behavior: Box<dyn NodeBehavior> = if n.class() == "relay" {
                    Box::new(Relay)
                } else {
                    Box::new(Source)
                };
                Arc::new(NodeSlot::new(behavior, n, &schedule))
            })
            .collect();
        (schedule, slots)
    }

    fn event() -> Event {
        Event {
            id: EventId(1),
            sequence: 1,
        }
    }

    #[test]
    fn test_chain_moves_value() {
        let mut graph = CompositionGraph::new("t");
        graph
            .add_node("S", "source", false, &[PortDecl::trigger("fired", SchedulingPolicy::Enqueue)])
            .unwrap();
        graph.add_node("A", "relay", false, &relay_ports()).unwrap();
        graph.add_node("B", "relay", false, &relay_ports()).unwrap();
        wire(&mut graph, "S:fired", "A:in");
        wire(&mut graph, "A:out", "B:in");
        let (schedule, slots) = build(&graph);

        let hub = TelemetryHub::new();
        let telemetry = TelemetryEmitter::new(hub, CompositionIdentifier::top(), 64);
        let stats = InstanceStats::default();
        let propagator = Propagator {
            schedule: &schedule,
            slots: &slots,
            telemetry: &telemetry,
            stats: &stats,
        };
        let trigger_id = schedule.trigger_by_identifier("S:fired").unwrap();
        let trigger = schedule.trigger(trigger_id);
        let origin = schedule.port_by_identifier("S:fired").unwrap();

        let report = propagator
            .run(trigger, event(), &[(origin, Some(PortValue::Integer(7)))], &mut |_, _| {})
            .unwrap();
        assert_eq!(report.executions, 2);

        let b = schedule.node_by_name("B").unwrap();
        assert_eq!(slots[b.index() as usize].lock().outputs[0], PortValue::Integer(7));
    }

    #[test]
    fn test_wall_takes_data_without_executing() {
        let mut graph = CompositionGraph::new("t");
        graph
            .add_node("S", "source", false, &[PortDecl::trigger("fired", SchedulingPolicy::Enqueue)])
            .unwrap();
        graph
            .add_node(
                "H",
                "relay",
                false,
                &[
                    PortDecl::input("in").with_blocking(EventBlocking::Wall),
                    PortDecl::output("out"),
                ],
            )
            .unwrap();
        wire(&mut graph, "S:fired", "H:in");
        let (schedule, slots) = build(&graph);

        let telemetry = TelemetryEmitter::new(TelemetryHub::new(), CompositionIdentifier::top(), 64);
        let stats = InstanceStats::default();
        let propagator = Propagator {
            schedule: &schedule,
            slots: &slots,
            telemetry: &telemetry,
            stats: &stats,
        };
        let trigger = schedule.trigger(schedule.trigger_by_identifier("S:fired").unwrap());
        let origin = schedule.port_by_identifier("S:fired").unwrap();
        let report = propagator
            .run(trigger, event(), &[(origin, Some("x".into()))], &mut |_, _| {})
            .unwrap();

        assert_eq!(report.executions, 0);
        let h = schedule.node_by_name("H").unwrap();
        assert_eq!(slots[h.index() as usize].lock().inputs[0], PortValue::from("x"));
    }
}
