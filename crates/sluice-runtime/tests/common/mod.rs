//! Node classes shared by the runtime integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sluice_core::{
    CompositionGraph, EventBlocking, NodeId, PortDecl, PortValue, SchedulingPolicy,
};
use sluice_runtime::{
    InstantiateContext, NodeBehavior, NodeClass, NodeClassResolver, NodeContext, NodeDescriptor,
    NodeError,
};

pub type Factory = Arc<dyn Fn(&str) -> Box<dyn NodeBehavior> + Send + Sync>;

/// Node class assembled from a port list and a behavior factory.
pub struct FnClass {
    id: String,
    stateful: bool,
    ports: Vec<PortDecl>,
    factory: Factory,
}

impl FnClass {
    pub fn new(
        id: &str,
        stateful: bool,
        ports: Vec<PortDecl>,
        factory: impl Fn(&str) -> Box<dyn NodeBehavior> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.to_string(),
            stateful,
            ports,
            factory: Arc::new(factory),
        }
    }
}

impl NodeClass for FnClass {
    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            id: self.id.clone(),
            name: self.id.clone(),
            description: String::new(),
            stateful: self.stateful,
        }
    }

    fn ports(&self) -> Vec<PortDecl> {
        self.ports.clone()
    }

    fn instantiate(&self, ctx: &InstantiateContext<'_>) -> Result<Box<dyn NodeBehavior>, NodeError> {
        Ok((self.factory)(ctx.node_name()))
    }
}

/// Shared execution log.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

struct Relay {
    name: String,
    log: Log,
    delay: Option<Duration>,
}

impl NodeBehavior for Relay {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input("in")?.clone();
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.log.push(format!("{}={}", self.name, value));
        ctx.set_output_data("out", value)
    }
}

struct Join {
    name: String,
    log: Log,
}

impl NodeBehavior for Join {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let sum = ctx.input_integer("a")? + ctx.input_integer("b")?;
        self.log.push(format!("{}={}", self.name, sum));
        ctx.set_output_data("out", sum)
    }
}

struct Alternate {
    executions: u64,
}

impl NodeBehavior for Alternate {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        self.executions += 1;
        if self.executions % 2 == 1 {
            let value = ctx.input("value")?.clone();
            ctx.set_output("allowed", value)?;
        }
        Ok(())
    }
}

struct Hold;

impl NodeBehavior for Hold {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input("new_value")?.clone();
        ctx.set_output_data("held", value)
    }
}

struct Count {
    count: i64,
}

impl NodeBehavior for Count {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if ctx.received_event("increment") {
            self.count += 1;
        }
        ctx.set_output_data("count", self.count)
    }
}

struct AddOne {
    name: String,
    log: Log,
}

impl NodeBehavior for AddOne {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input_integer("in")?;
        self.log.push(format!("{}={} ({:?})", self.name, value, ctx.pass()));
        ctx.set_output_data("out", value + 1)
    }
}

struct FailOn;

impl NodeBehavior for FailOn {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input("value")?.clone();
        if &value == ctx.input("failing_value")? {
            return Err(NodeError::failed(format!("refusing {value}")));
        }
        ctx.set_output_data("out", value)
    }
}

struct SpinOff;

impl NodeBehavior for SpinOff {
    fn execute(&mut self, ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = ctx.input_integer("value")?;
        if value < 3 {
            ctx.spin_off("spun", value + 1)?;
        }
        ctx.set_output_data("out", value)
    }
}

struct Inert;

impl NodeBehavior for Inert {
    fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }
}

/// The standard test classes:
///
/// | id | ports |
/// |----|-------|
/// | `trigger` | trigger `fired` (enqueue) |
/// | `trigger_drop` | trigger `fired` (drop) |
/// | `relay` | `in` → `out`, logs `name=value` |
/// | `slow_relay` | like `relay`, sleeps 20 ms |
/// | `join` | `a`, `b` → `out` = a + b |
/// | `alternate` | door `value` → `allowed` on odd executions |
/// | `hold` | wall `new_value`, event `refresh` → `held` |
/// | `count` | event `increment` → `count` |
/// | `add_one` | `in` → `out` = in + 1 |
/// | `fail_on` | `value`, `failing_value` (13) → `out` |
/// | `spin_off` | `value` → `out`, trigger `spun` fires value + 1 while < 3 |
pub struct Classes {
    map: HashMap<String, Arc<dyn NodeClass>>,
}

impl Classes {
    pub fn new(log: &Log) -> Self {
        let mut classes = Self {
            map: HashMap::new(),
        };
        classes.insert(FnClass::new(
            "trigger",
            false,
            vec![PortDecl::trigger("fired", SchedulingPolicy::Enqueue)],
            |_| Box::new(Inert),
        ));
        classes.insert(FnClass::new(
            "trigger_drop",
            false,
            vec![PortDecl::trigger("fired", SchedulingPolicy::Drop)],
            |_| Box::new(Inert),
        ));
        for (id, delay) in [("relay", None), ("slow_relay", Some(Duration::from_millis(20)))] {
            let log = log.clone();
            classes.insert(FnClass::new(
                id,
                false,
                vec![PortDecl::input("in"), PortDecl::output("out")],
                move |name| {
                    Box::new(Relay {
                        name: name.to_string(),
                        log: log.clone(),
                        delay,
                    })
                },
            ));
        }
        let join_log = log.clone();
        classes.insert(FnClass::new(
            "join",
            false,
            vec![
                PortDecl::input("a").with_default(0),
                PortDecl::input("b").with_default(0),
                PortDecl::output("out"),
            ],
            move |name| {
                Box::new(Join {
                    name: name.to_string(),
                    log: join_log.clone(),
                })
            },
        ));
        classes.insert(FnClass::new(
            "alternate",
            true,
            vec![
                PortDecl::input("value").with_blocking(EventBlocking::Door),
                PortDecl::output("allowed"),
            ],
            |_| Box::new(Alternate { executions: 0 }),
        ));
        classes.insert(FnClass::new(
            "hold",
            true,
            vec![
                PortDecl::input("new_value").with_blocking(EventBlocking::Wall),
                PortDecl::event_input("refresh"),
                PortDecl::output("held"),
            ],
            |_| Box::new(Hold),
        ));
        classes.insert(FnClass::new(
            "count",
            true,
            vec![PortDecl::event_input("increment"), PortDecl::output("count")],
            |_| Box::new(Count { count: 0 }),
        ));
        let add_log = log.clone();
        classes.insert(FnClass::new(
            "add_one",
            false,
            vec![PortDecl::input("in").with_default(0), PortDecl::output("out")],
            move |name| {
                Box::new(AddOne {
                    name: name.to_string(),
                    log: add_log.clone(),
                })
            },
        ));
        classes.insert(FnClass::new(
            "fail_on",
            false,
            vec![
                PortDecl::input("value"),
                PortDecl::input("failing_value").with_default(13),
                PortDecl::output("out"),
            ],
            |_| Box::new(FailOn),
        ));
        classes.insert(FnClass::new(
            "spin_off",
            false,
            vec![
                PortDecl::input("value").with_default(0),
                PortDecl::output("out"),
                PortDecl::trigger("spun", SchedulingPolicy::Enqueue),
            ],
            |_| Box::new(SpinOff),
        ));
        classes
    }

    pub fn insert(&mut self, class: impl NodeClass + 'static) {
        let id = class.descriptor().id;
        self.map.insert(id, Arc::new(class));
    }

    pub fn get(&self, id: &str) -> Arc<dyn NodeClass> {
        Arc::clone(&self.map[id])
    }

    pub fn resolver(&self) -> Arc<dyn NodeClassResolver> {
        Arc::new(self.map.clone())
    }

    /// Adds node `name` of class `id` with the class's ports.
    pub fn add(&self, graph: &mut CompositionGraph, name: &str, id: &str) -> NodeId {
        let class = self.get(id);
        let stateful = class.descriptor().stateful;
        graph.add_node(name, id, stateful, &class.ports()).unwrap()
    }
}

pub fn wire(graph: &mut CompositionGraph, from: &str, to: &str) {
    let from = graph.port_by_identifier(from).unwrap();
    let to = graph.port_by_identifier(to).unwrap();
    graph.connect(from, to).unwrap();
}

pub fn wire_feedback(graph: &mut CompositionGraph, from: &str, to: &str) {
    let from = graph.port_by_identifier(from).unwrap();
    let to = graph.port_by_identifier(to).unwrap();
    graph.connect_feedback(from, to).unwrap();
}

pub fn int(value: i64) -> PortValue {
    PortValue::Integer(value)
}

pub const WAIT: Duration = Duration::from_secs(5);
