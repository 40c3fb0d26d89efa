//! Telemetry subscription tests.

mod common;

use std::time::Duration;

use common::{Classes, Log, int, wire};
use sluice_core::{CompositionGraph, CompositionIdentifier};
use sluice_runtime::{LifecycleState, Runner, RuntimeConfig, TelemetryRecord};

fn chain(classes: &Classes) -> CompositionGraph {
    let mut graph = CompositionGraph::new("Chain");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "A", "relay");
    classes.add(&mut graph, "B", "relay");
    wire(&mut graph, "T:fired", "A:in");
    wire(&mut graph, "A:out", "B:in");
    graph
}

fn runner(graph: &CompositionGraph, classes: &Classes, config: RuntimeConfig) -> Runner {
    let runner = Runner::build(graph.compile().unwrap(), classes.resolver(), config).unwrap();
    runner.start().unwrap();
    runner
}

fn top() -> CompositionIdentifier {
    CompositionIdentifier::top()
}

// ============================================================================
// Subscription kinds
// ============================================================================

#[test]
fn event_telemetry_reports_executions_in_order() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let runner = runner(&chain(&classes), &classes, RuntimeConfig::default());
    let events = runner.subscribe_to_event_telemetry(&top());

    runner
        .fire_trigger_port_event_with_value("T:fired", int(4))
        .unwrap();
    runner.wait_for_fired_event();

    let executions: Vec<String> = events
        .drain()
        .into_iter()
        .filter_map(|record| match record {
            TelemetryRecord::NodeExecutionStarted { node, .. } => Some(format!("start {node}")),
            TelemetryRecord::NodeExecutionFinished { node, .. } => Some(format!("end {node}")),
            _ => None,
        })
        .collect();
    assert_eq!(executions, vec!["start A", "end A", "start B", "end B"]);
}

#[test]
fn event_telemetry_omits_value_summaries() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let runner = runner(&chain(&classes), &classes, RuntimeConfig::default());
    let events = runner.subscribe_to_event_telemetry(&top());
    let all = runner.subscribe_to_all_telemetry(&top());

    runner
        .fire_trigger_port_event_with_value("T:fired", int(4))
        .unwrap();
    runner.wait_for_fired_event();

    let event_updates: Vec<TelemetryRecord> = events
        .drain()
        .into_iter()
        .filter(|r| matches!(r, TelemetryRecord::PortUpdated { .. }))
        .collect();
    assert!(!event_updates.is_empty());
    assert!(event_updates.iter().all(|r| matches!(
        r,
        TelemetryRecord::PortUpdated { summary: None, .. }
    )));

    assert!(all.drain().iter().any(|r| matches!(
        r,
        TelemetryRecord::PortUpdated { port, summary: Some(s), .. }
            if port == "B:out" && s == "4"
    )));
}

#[test]
fn port_telemetry_reports_one_port() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let runner = runner(&chain(&classes), &classes, RuntimeConfig::default());
    let port = runner.subscribe_to_port_telemetry(&top(), "A:out");

    runner
        .fire_trigger_port_event_with_value("T:fired", int(7))
        .unwrap();
    runner.wait_for_fired_event();

    let updates = port.drain();
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0],
        TelemetryRecord::PortUpdated {
            composition: top(),
            port: "A:out".into(),
            sent_event: true,
            sent_data: true,
            summary: Some("7".into()),
        }
    );
}

#[test]
fn summaries_are_truncated() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let config = RuntimeConfig {
        summary_max_len: 8,
        ..RuntimeConfig::default()
    };
    let runner = runner(&chain(&classes), &classes, config);
    let port = runner.subscribe_to_port_telemetry(&top(), "B:out");

    runner
        .fire_trigger_port_event_with_value("T:fired", "a rather long text value".into())
        .unwrap();
    runner.wait_for_fired_event();

    let summary = port.drain().into_iter().find_map(|r| match r {
        TelemetryRecord::PortUpdated { summary, .. } => summary,
        _ => None,
    });
    let summary = summary.unwrap();
    assert_eq!(summary.chars().count(), 8);
    assert!(summary.starts_with("\"a rath"));
    assert!(summary.ends_with('…'));
}

// ============================================================================
// Lifecycle records
// ============================================================================

#[test]
fn dropped_firing_is_reported() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Drop");
    classes.add(&mut graph, "T", "trigger_drop");
    classes.add(&mut graph, "Slow", "slow_relay");
    wire(&mut graph, "T:fired", "Slow:in");
    let runner = runner(&graph, &classes, RuntimeConfig::default());
    let events = runner.subscribe_to_event_telemetry(&top());

    runner.fire_trigger_port_event("T:fired").unwrap();
    runner.fire_trigger_port_event("T:fired").unwrap();
    runner.wait_for_fired_event();

    assert!(events.drain().iter().any(|r| matches!(
        r,
        TelemetryRecord::EventDropped { port, .. } if port == "T:fired"
    )));
}

#[test]
fn failure_is_reported_to_port_subscribers() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let mut graph = CompositionGraph::new("Failing");
    classes.add(&mut graph, "T", "trigger");
    classes.add(&mut graph, "F", "fail_on");
    wire(&mut graph, "T:fired", "F:value");
    let runner = runner(&graph, &classes, RuntimeConfig::default());
    let port = runner.subscribe_to_port_telemetry(&top(), "F:out");

    runner
        .fire_trigger_port_event_with_value("T:fired", int(13))
        .unwrap();
    runner.wait_for_fired_event();
    assert_eq!(runner.state(), LifecycleState::Failed);

    let error = port.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(
        error,
        TelemetryRecord::ErrorOccurred { ref message, .. } if message.contains("refusing 13")
    ));
}

#[test]
fn stopping_is_reported_once() {
    let log = Log::default();
    let classes = Classes::new(&log);
    let runner = runner(&chain(&classes), &classes, RuntimeConfig::default());
    let events = runner.subscribe_to_event_telemetry(&top());

    runner.stop();
    assert_eq!(
        events.drain(),
        vec![TelemetryRecord::CompositionStopping { composition: top() }]
    );

    runner.stop();
    assert!(events.try_recv().is_none());
}
