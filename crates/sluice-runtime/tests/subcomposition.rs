//! Subcomposition tests: compositions used as nodes, nested identifiers,
//! scoped telemetry, and failure propagation.

mod common;

use std::sync::Arc;

use common::{Classes, Log, WAIT, int, wire};
use sluice_core::{CompositionGraph, CompositionIdentifier, GraphSchedule};
use sluice_runtime::{
    ControlError, LifecycleState, NodeClass, Runner, RuntimeConfig, SubcompositionClass,
    TelemetryRecord,
};

/// `x` → `A` (add_one) → `y`.
fn plus_one(classes: &Classes) -> Arc<GraphSchedule> {
    let mut graph = CompositionGraph::new("PlusOne");
    let x = graph.add_published_input("x", true).unwrap();
    let a = classes.add(&mut graph, "A", "add_one");
    let a_in = graph.port(a, "in").unwrap();
    let a_out = graph.port(a, "out").unwrap();
    graph.connect(x, a_in).unwrap();
    graph.add_published_output("y", a_out).unwrap();
    graph.compile().unwrap()
}

/// `x` → `Hold` (wall) ; `Hold:held` → `y`. Events never reach `y`.
fn walled(classes: &Classes) -> Arc<GraphSchedule> {
    let mut graph = CompositionGraph::new("Walled");
    let x = graph.add_published_input("x", true).unwrap();
    let hold = classes.add(&mut graph, "Hold", "hold");
    let new_value = graph.port(hold, "new_value").unwrap();
    let held = graph.port(hold, "held").unwrap();
    graph.connect(x, new_value).unwrap();
    graph.add_published_output("y", held).unwrap();
    graph.compile().unwrap()
}

/// `T` → `Sub:x`, `Sub:y` → `R`.
fn parent(classes: &Classes, sub_class: &str) -> CompositionGraph {
    let mut graph = CompositionGraph::new("Parent");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "Sub", sub_class);
    classes.add(&mut graph, "R", "relay");
    wire(&mut graph, "T:fired", "Sub:x");
    wire(&mut graph, "Sub:y", "R:in");
    graph
}

fn started(graph: &CompositionGraph, classes: &Classes) -> Runner {
    let runner = Runner::build(
        graph.compile().unwrap(),
        classes.resolver(),
        RuntimeConfig::default(),
    )
    .unwrap();
    runner.start().unwrap();
    runner
}

fn sub_id() -> CompositionIdentifier {
    CompositionIdentifier::top().child("Sub")
}

#[test]
fn subcomposition_ports_mirror_published_ports() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let class = SubcompositionClass::new("plus_one", plus_one(&classes));
    let ports = class.ports();
    let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y"]);
    assert!(class.descriptor().stateful);
}

#[test]
fn event_flows_through_subcomposition() {
    let log = Log::default();
    let mut classes = Classes::new(&log);
    classes.insert(SubcompositionClass::new("plus_one", plus_one(&classes)));
    let runner = started(&parent(&classes, "plus_one"), &classes);

    runner
        .fire_trigger_port_event_with_value("T:fired", int(1))
        .unwrap();
    runner.wait_for_fired_event();

    assert_eq!(log.entries(), vec!["A=1 (Forward)", "R=2"]);
    assert_eq!(runner.get_port_value(&sub_id(), "A:out").unwrap(), int(2));
    assert_eq!(
        runner.instance().instances(),
        vec![CompositionIdentifier::top(), sub_id()]
    );
}

#[test]
fn blocked_event_does_not_leave_subcomposition() {
    let log = Log::default();
    let mut classes = Classes::new(&log);
    classes.insert(SubcompositionClass::new("walled", walled(&classes)));
    let runner = started(&parent(&classes, "walled"), &classes);

    runner
        .fire_trigger_port_event_with_value("T:fired", int(3))
        .unwrap();
    runner.wait_for_fired_event();

    assert!(log.entries().is_empty());
    assert_eq!(runner.get_port_value(&sub_id(), "Hold:new_value").unwrap(), int(3));
}

#[test]
fn telemetry_scope_selects_subtree() {
    let log = Log::default();
    let mut classes = Classes::new(&log);
    classes.insert(SubcompositionClass::new("plus_one", plus_one(&classes)));
    let runner = started(&parent(&classes, "plus_one"), &classes);

    let inner = runner.subscribe_to_event_telemetry(&sub_id());
    let outer = runner.subscribe_to_event_telemetry(&CompositionIdentifier::top());
    let port = runner.subscribe_to_port_telemetry(&sub_id(), "A:out");

    runner
        .fire_trigger_port_event_with_value("T:fired", int(1))
        .unwrap();
    runner.wait_for_fired_event();

    let started_nodes = |records: Vec<TelemetryRecord>| -> Vec<String> {
        records
            .into_iter()
            .filter_map(|r| match r {
                TelemetryRecord::NodeExecutionStarted { node, .. } => Some(node),
                _ => None,
            })
            .collect()
    };
    assert_eq!(started_nodes(inner.drain()), vec!["A"]);
    let mut all = started_nodes(outer.drain());
    all.sort();
    assert_eq!(all, vec!["A", "R", "Sub"]);

    let updates = port.drain();
    assert!(!updates.is_empty());
    assert!(updates.iter().all(|r| r.port() == Some("A:out")));
    assert!(updates.iter().any(|r| matches!(
        r,
        TelemetryRecord::PortUpdated { summary: Some(s), .. } if s == "2"
    )));
}

#[test]
fn child_failure_fails_parent() {
    let log = Log::default();
    let mut classes = Classes::new(&log);
    let mut child = CompositionGraph::new("Fails");
    let x = child.add_published_input("x", true).unwrap();
    let f = classes.add(&mut child, "F", "fail_on");
    let value = child.port(f, "value").unwrap();
    let out = child.port(f, "out").unwrap();
    child.connect(x, value).unwrap();
    child.add_published_output("y", out).unwrap();
    classes.insert(SubcompositionClass::new("fails", child.compile().unwrap()));

    let runner = started(&parent(&classes, "fails"), &classes);
    runner
        .fire_trigger_port_event_with_value("T:fired", int(13))
        .unwrap();
    runner.wait_for_fired_event();

    assert_eq!(runner.state(), LifecycleState::Failed);
    assert_eq!(
        runner.fire_trigger_port_event("T:fired"),
        Err(ControlError::Failed)
    );
}

#[test]
fn stopping_parent_stops_children() {
    let log = Log::default();
    let mut classes = Classes::new(&log);
    classes.insert(SubcompositionClass::new("plus_one", plus_one(&classes)));
    let runner = started(&parent(&classes, "plus_one"), &classes);
    assert!(runner.instance().wait_idle(WAIT));

    runner.stop();
    assert!(runner.instance().instances().is_empty());
    assert_eq!(
        runner.get_port_value(&sub_id(), "A:out"),
        Err(ControlError::UnknownComposition("Top/Sub".into()))
    );
}
