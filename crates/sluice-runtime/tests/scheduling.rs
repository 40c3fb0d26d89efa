//! Integration tests for event propagation.
//!
//! Builds small compositions from the shared test classes and checks which
//! nodes execute, in what order, and what values move: chains, joins, wall
//! and door blocking, feedback, spin-offs, and published ports.

mod common;

use common::{Classes, Log, WAIT, int, wire, wire_feedback};
use sluice_core::{CompositionGraph, CompositionIdentifier, PortValue};
use sluice_runtime::{
    Admission, ControlError, LifecycleState, Runner, RuntimeConfig, TelemetryRecord,
};

fn runner(graph: &CompositionGraph, classes: &Classes) -> Runner {
    let schedule = graph.compile().unwrap();
    let runner = Runner::build(schedule, classes.resolver(), RuntimeConfig::default()).unwrap();
    runner.start().unwrap();
    runner
}

// ============================================================================
// 1. Ordering
// ============================================================================

#[test]
fn chain_executes_in_topological_order() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Chain");
    classes.add(&mut graph, "T", "trigger");
    // Added out of order on purpose.
    classes.add(&mut graph, "C", "relay");
    classes.add(&mut graph, "A", "relay");
    classes.add(&mut graph, "B", "relay");
    wire(&mut graph, "T:fired", "A:in");
    wire(&mut graph, "A:out", "B:in");
    wire(&mut graph, "B:out", "C:in");

    let runner = runner(&graph, &classes);
    runner
        .fire_trigger_port_event_with_value("T:fired", int(5))
        .unwrap();
    runner.wait_for_fired_event();

    assert_eq!(log.entries(), vec!["A=5", "B=5", "C=5"]);
    assert_eq!(
        runner
            .get_port_value(&CompositionIdentifier::top(), "C:out")
            .unwrap(),
        int(5)
    );
}

#[test]
fn join_executes_once_after_both_branches() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Join");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "Left", "relay");
    classes.add(&mut graph, "Right", "relay");
    classes.add(&mut graph, "J", "join");
    wire(&mut graph, "T:fired", "Left:in");
    wire(&mut graph, "T:fired", "Right:in");
    wire(&mut graph, "Left:out", "J:a");
    wire(&mut graph, "Right:out", "J:b");

    let runner = runner(&graph, &classes);
    runner
        .fire_trigger_port_event_with_value("T:fired", int(2))
        .unwrap();
    runner.wait_for_fired_event();

    let entries = log.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries.last().map(String::as_str), Some("J=4"));
    assert_eq!(log.count("J="), 1);
    assert_eq!(runner.stats().node_executions, 3);
}

#[test]
fn trigger_value_is_kept_when_fired_without_value() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Keep");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "A", "relay");
    wire(&mut graph, "T:fired", "A:in");

    let runner = runner(&graph, &classes);
    runner
        .fire_trigger_port_event_with_value("T:fired", int(9))
        .unwrap();
    runner.fire_trigger_port_event("T:fired").unwrap();
    runner.wait_for_fired_event();

    assert_eq!(log.entries(), vec!["A=9", "A=9"]);
}

// ============================================================================
// 2. Event blocking
// ============================================================================

#[test]
fn wall_takes_data_but_blocks_the_event() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Wall");
    classes.add(&mut graph, "Value", "trigger");
    classes.add(&mut graph, "Refresh", "trigger");
    classes.add(&mut graph, "Hold", "hold");
    classes.add(&mut graph, "Out", "relay");
    wire(&mut graph, "Value:fired", "Hold:new_value");
    wire(&mut graph, "Refresh:fired", "Hold:refresh");
    wire(&mut graph, "Hold:held", "Out:in");

    let runner = runner(&graph, &classes);
    let top = CompositionIdentifier::top();
    runner
        .fire_trigger_port_event_with_value("Value:fired", int(7))
        .unwrap();
    runner.wait_for_fired_event();

    assert!(log.entries().is_empty());
    assert_eq!(runner.get_port_value(&top, "Hold:new_value").unwrap(), int(7));
    assert_eq!(runner.get_port_value(&top, "Hold:held").unwrap(), PortValue::None);

    runner.fire_trigger_port_event("Refresh:fired").unwrap();
    runner.wait_for_fired_event();
    assert_eq!(log.entries(), vec!["Out=7"]);
}

#[test]
fn door_lets_every_other_event_through() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("AllowAlternating");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "Door", "alternate");
    classes.add(&mut graph, "Count", "count");
    wire(&mut graph, "T:fired", "Door:value");
    wire(&mut graph, "Door:allowed", "Count:increment");

    let runner = runner(&graph, &classes);
    let top = CompositionIdentifier::top();
    let mut counts = Vec::new();
    for i in 1..=5 {
        runner
            .fire_trigger_port_event_with_value("T:fired", int(i))
            .unwrap();
        runner.wait_for_fired_event();
        counts.push(runner.get_port_value(&top, "Count:count").unwrap());
    }

    assert_eq!(counts, vec![int(1), int(1), int(2), int(2), int(3)]);
}

// ============================================================================
// 3. Feedback
// ============================================================================

#[test]
fn feedback_delivers_previous_value_once_per_firing() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Loop");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "A", "relay");
    classes.add(&mut graph, "B", "relay");
    wire(&mut graph, "T:fired", "A:in");
    wire(&mut graph, "A:out", "B:in");
    wire_feedback(&mut graph, "B:out", "A:in");

    let runner = runner(&graph, &classes);
    for i in 1..=3 {
        runner
            .fire_trigger_port_event_with_value("T:fired", int(i))
            .unwrap();
    }
    runner.wait_for_fired_event();

    let stats = runner.stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.node_executions, 9);
    assert_eq!(stats.feedback_executions, 3);

    let entries = log.entries();
    // Third firing: forward A=3, B=3, then B's value from before the firing.
    assert_eq!(&entries[6..], ["A=3", "B=3", "A=2"]);

    let top = CompositionIdentifier::top();
    assert_eq!(runner.get_port_value(&top, "B:out").unwrap(), int(3));
    // The feedback pass moves data downstream without an event.
    assert_eq!(runner.get_port_value(&top, "B:in").unwrap(), int(2));
}

// ============================================================================
// 4. Spin-offs
// ============================================================================

#[test]
fn spin_off_starts_independent_firing() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Spin");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "S", "spin_off");
    classes.add(&mut graph, "R", "relay");
    wire(&mut graph, "T:fired", "S:value");
    wire(&mut graph, "S:spun", "R:in");

    let runner = runner(&graph, &classes);
    runner
        .fire_trigger_port_event_with_value("T:fired", int(0))
        .unwrap();
    runner.wait_for_fired_event();
    assert!(runner.instance().wait_idle(WAIT));

    assert_eq!(log.entries(), vec!["R=1"]);
    assert_eq!(runner.stats().completed, 2);
}

// ============================================================================
// 5. Published ports
// ============================================================================

#[test]
fn published_input_reaches_published_output() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Published");
    let x = graph.add_published_input("x", true).unwrap();
    let a = classes.add(&mut graph, "A", "add_one");
    let a_in = graph.port(a, "in").unwrap();
    graph.connect(x, a_in).unwrap();
    let a_out = graph.port(a, "out").unwrap();
    graph.add_published_output("y", a_out).unwrap();
    graph.add_published_output("seen", a_in).unwrap();

    let runner = runner(&graph, &classes);
    runner
        .fire_published_input_event_with_values(&[("x", int(4))])
        .unwrap();
    assert!(runner.wait_for_published_output_event(WAIT));

    assert_eq!(runner.published_output_value("y").unwrap(), int(5));
    assert_eq!(runner.published_output_value("seen").unwrap(), int(4));
    assert!(!runner.wait_for_published_output_event(std::time::Duration::from_millis(20)));
}

#[test]
fn firing_one_published_input_leaves_the_others_silent() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Subset");
    let a = graph.add_published_input("a", true).unwrap();
    let b = graph.add_published_input("b", true).unwrap();
    let left = classes.add(&mut graph, "Left", "relay");
    let right = classes.add(&mut graph, "Right", "relay");
    let left_in = graph.port(left, "in").unwrap();
    let right_in = graph.port(right, "in").unwrap();
    graph.connect(a, left_in).unwrap();
    graph.connect(b, right_in).unwrap();

    let runner = runner(&graph, &classes);
    runner
        .fire_published_input_event_with_values(&[("a", int(1))])
        .unwrap();
    runner.wait_for_fired_event();
    assert_eq!(log.entries(), vec!["Left=1"]);

    log.clear();
    runner.instance().set_published_input_value("b", int(2)).unwrap();
    runner.fire_published_input_event(&[]).unwrap();
    runner.wait_for_fired_event();
    let mut entries = log.entries();
    entries.sort();
    assert_eq!(entries, vec!["Left=1", "Right=2"]);

    assert_eq!(
        runner.fire_published_input_event(&["missing"]),
        Err(ControlError::UnknownPublishedInput("missing".into()))
    );
}

// ============================================================================
// 6. Failure
// ============================================================================

#[test]
fn node_error_fails_the_composition() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Fail");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "F", "fail_on");
    classes.add(&mut graph, "After", "relay");
    wire(&mut graph, "T:fired", "F:value");
    wire(&mut graph, "F:out", "After:in");

    let runner = runner(&graph, &classes);
    let errors = runner.subscribe_to_event_telemetry(&CompositionIdentifier::top());

    runner
        .fire_trigger_port_event_with_value("T:fired", int(1))
        .unwrap();
    runner.wait_for_fired_event();
    assert_eq!(log.entries(), vec!["After=1"]);

    runner
        .fire_trigger_port_event_with_value("T:fired", int(13))
        .unwrap();
    runner.wait_for_fired_event();
    assert_eq!(log.entries(), vec!["After=1"]);
    assert_eq!(runner.state(), LifecycleState::Failed);

    let message = std::iter::from_fn(|| errors.recv_timeout(WAIT)).find_map(|r| match r {
        TelemetryRecord::ErrorOccurred { message, .. } => Some(message),
        _ => None,
    });
    assert!(message.is_some_and(|m| m.contains("refusing 13")));

    assert_eq!(
        runner.fire_trigger_port_event("T:fired"),
        Err(ControlError::Failed)
    );
}

#[test]
fn firing_a_non_trigger_port_is_rejected() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Reject");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "A", "relay");
    wire(&mut graph, "T:fired", "A:in");

    let runner = runner(&graph, &classes);
    assert_eq!(
        runner.fire_trigger_port_event("A:out"),
        Err(ControlError::UnknownTrigger("A:out".into()))
    );
    assert_eq!(
        runner.fire_trigger_port_event("Nope:fired"),
        Err(ControlError::UnknownPort("Nope:fired".into()))
    );
    assert!(matches!(
        runner.fire_trigger_port_event("T:fired"),
        Ok(Admission::Admitted(_) | Admission::Queued(_))
    ));
}
