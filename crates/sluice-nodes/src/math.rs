//! Counting and arithmetic.

use sluice_core::{EventBlocking, PortDecl, PortValue};
use sluice_runtime::{InstantiateContext, NodeBehavior, NodeContext, NodeError};

// --- count ---

pub(crate) fn count_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("increment").with_default(1),
        PortDecl::input("decrement").with_default(1),
        PortDecl::input("set_count")
            .with_blocking(EventBlocking::Door)
            .with_default(0),
        PortDecl::output("count"),
    ]
}

pub(crate) fn count(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(Count { count: 0 })
}

/// Running total, adjusted by each event on `increment` or `decrement`.
///
/// An event on `set_count` replaces the total without sending an event.
struct Count {
    count: i64,
}

impl NodeBehavior for Count {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if ctx.received_event("set_count") {
            self.count = ctx.input_integer("set_count")?;
        }
        if ctx.received_event("increment") {
            self.count += ctx.input_integer("increment")?;
        }
        if ctx.received_event("decrement") {
            self.count -= ctx.input_integer("decrement")?;
        }
        ctx.set_output_data("count", self.count)
    }
}

// --- add ---

pub(crate) fn add_ports() -> Vec<PortDecl> {
    vec![
        PortDecl::input("a").with_default(0),
        PortDecl::input("b").with_default(0),
        PortDecl::output("sum"),
    ]
}

pub(crate) fn add(_ctx: &InstantiateContext<'_>) -> Box<dyn NodeBehavior> {
    Box::new(Add)
}

/// `a + b`; integer if both are integers, real otherwise.
struct Add;

impl NodeBehavior for Add {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let a = ctx.input("a")?;
        let b = ctx.input("b")?;
        let sum = match (a.as_integer(), b.as_integer()) {
            (Some(a), Some(b)) => PortValue::Integer(a.wrapping_add(b)),
            _ => PortValue::Real(ctx.input_real("a")? + ctx.input_real("b")?),
        };
        ctx.set_output_data("sum", sum)
    }
}
