//! Nodes that decide whether an event continues: doors and walls.

use sluice_core::{EventBlocking, PortDecl};
use sluice_runtime::{InstantiateContext, NodeBehavior, NodeContext, NodeError};

// --- allow_alternating ---

pub(crate) fn allow_alternating_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("value").with_blocking(EventBlocking::Door),
        PortDecl::output("allowed"),
    ]
}

pub(crate) fn allow_alternating(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(AllowAlternating { events: 0 })
}

/// Lets the 1st, 3rd, 5th, ... event through.
struct AllowAlternating {
    events: u64,
}

impl NodeBehavior for AllowAlternating {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if !ctx.received_event("value") {
            return Ok(());
        }
        self.events += 1;
        if self.events % 2 == 1 {
            let value = ctx.input("value")?.clone();
            ctx.set_output("allowed", value)?;
        }
        Ok(())
    }
}

// --- allow_first ---

pub(crate) fn allow_first_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("value").with_blocking(EventBlocking::Door),
        PortDecl::event_input("reset").with_blocking(EventBlocking::Door),
        PortDecl::output("first"),
    ]
}

pub(crate) fn allow_first(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(AllowFirst { open: true })
}

/// Lets only the first event through until `reset` receives an event.
struct AllowFirst {
    open: bool,
}

impl NodeBehavior for AllowFirst {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if ctx.received_event("reset") {
            self.open = true;
        }
        if self.open && ctx.received_event("value") {
            self.open = false;
            let value = ctx.input("value")?.clone();
            ctx.set_output("first", value)?;
        }
        Ok(())
    }
}

// --- hold_value ---

pub(crate) fn hold_value_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("new_value").with_blocking(EventBlocking::Wall),
        PortDecl::event_input("refresh"),
        PortDecl::output("held"),
    ]
}

pub(crate) fn hold_value(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(HoldValue)
}

/// Stores `new_value` silently; `refresh` sends it out.
struct HoldValue;

impl NodeBehavior for HoldValue {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input("new_value")?.clone();
        ctx.set_output_data("held", value)
    }
}
