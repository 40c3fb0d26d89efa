//! Nodes that shape the flow of events rather than their values.

use std::thread;
use std::time::Duration;

use sluice_core::{EventBlocking, PortDecl, PortValue, SchedulingPolicy};
use sluice_runtime::{InstantiateContext, NodeBehavior, NodeContext, NodeError};

// --- share_value ---

pub(crate) fn share_value_ports() -> Vec<PortDecl> {
    vec![PortDecl::input("value"), PortDecl::output("same_value")]
}

pub(crate) fn share_value(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(ShareValue)
}

struct ShareValue;

impl NodeBehavior for ShareValue {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input("value")?.clone();
        ctx.set_output_data("same_value", value)
    }
}

// --- spin_off_value ---

pub(crate) fn spin_off_value_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("value").with_blocking(EventBlocking::Door),
        PortDecl::trigger("spun_off", SchedulingPolicy::Enqueue),
    ]
}

pub(crate) fn spin_off_value(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(SpinOffValue)
}

/// Re-fires each received value from `spun_off` as an independent firing.
struct SpinOffValue;

impl NodeBehavior for SpinOffValue {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if ctx.received_event("value") {
            let value = ctx.input("value")?.clone();
            ctx.spin_off("spun_off", value)?;
        }
        Ok(())
    }
}

// --- wait ---

pub(crate) fn wait_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("milliseconds").with_default(0),
        PortDecl::event_output("done"),
    ]
}

pub(crate) fn wait(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(Wait)
}

/// Blocks the firing for `milliseconds`, then lets the event continue.
struct Wait;

impl NodeBehavior for Wait {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let millis = ctx.input_integer("milliseconds")?;
        if millis > 0 {
            thread::sleep(Duration::from_millis(millis as u64));
        }
        Ok(())
    }
}

// --- fail_on ---

pub(crate) fn fail_on_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("value"),
        PortDecl::input("failing_value"),
        PortDecl::output("same_value"),
    ]
}

pub(crate) fn fail_on(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(FailOn)
}

/// Passes `value` through, failing when it equals `failing_value`.
struct FailOn;

impl NodeBehavior for FailOn {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input("value")?.clone();
        let failing = ctx.input("failing_value")?;
        if *failing != PortValue::None && value == *failing {
            return Err(NodeError::failed(format!(
                "{}: received failing value {value}",
                ctx.node_name()
            )));
        }
        ctx.set_output_data("same_value", value)
    }
}

// --- log_value ---

pub(crate) fn log_value_ports() -> Vec<PortDecl> {
    vec![PortDecl::input("value")]
}

pub(crate) fn log_value(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(LogValue)
}

/// Logs every value it receives at `info`.
struct LogValue;

impl NodeBehavior for LogValue {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input("value")?;
        tracing::info!(
            composition = %ctx.composition(),
            node = ctx.node_name(),
            event = ctx.event().id().index(),
            "{value}"
        );
        Ok(())
    }
}
