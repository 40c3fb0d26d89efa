//! Composition runtime for sluice.
//!
//! Takes a compiled [`GraphSchedule`](sluice_core::GraphSchedule) and runs it:
//! instantiates a [`NodeBehavior`] per node, gives every trigger its own
//! admission queue and worker thread, and propagates each admitted firing
//! through the trigger's precomputed order.
//!
//! # Execution model
//!
//! - Firings of one trigger never overlap and run in admission order.
//!   [`SchedulingPolicy::Enqueue`](sluice_core::SchedulingPolicy::Enqueue)
//!   queues a firing requested while another is in flight;
//!   [`SchedulingPolicy::Drop`](sluice_core::SchedulingPolicy::Drop) discards it.
//! - Firings of different triggers run concurrently. A node shared by both
//!   executes for one firing at a time.
//! - Within a firing every reached node executes at most once per pass,
//!   after all of its upstream nodes.
//! - A node failure stops the composition that owns it.
//!
//! # Modules
//!
//! - [`node`]: [`NodeClass`], [`NodeBehavior`], and the [`NodeContext`] a
//!   behavior executes with
//! - [`composition`]: [`CompositionInstance`], the owned top-level instance
//! - [`runner`]: [`Runner`], host conveniences on top of an instance
//! - [`subcomposition`]: [`SubcompositionClass`], a composition used as a node
//! - [`telemetry`]: execution and port-update records for subscribers
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use sluice_core::{CompositionGraph, PortDecl, SchedulingPolicy};
//! use sluice_runtime::{
//!     NodeBehavior, NodeClass, NodeContext, NodeDescriptor, NodeError, InstantiateContext,
//!     Runner, RuntimeConfig,
//! };
//!
//! struct Trigger;
//! impl NodeBehavior for Trigger {
//!     fn execute(&mut self, _ctx: &mut NodeContext<'_>) -> Result<(), NodeError> {
//!         Ok(())
//!     }
//! }
//!
//! struct TriggerClass;
//! impl NodeClass for TriggerClass {
//!     fn descriptor(&self) -> NodeDescriptor {
//!         NodeDescriptor {
//!             id: "trigger".into(),
//!             name: "Trigger".into(),
//!             description: "Fires on request".into(),
//!             stateful: false,
//!         }
//!     }
//!     fn ports(&self) -> Vec<PortDecl> {
//!         vec![PortDecl::trigger("fired", SchedulingPolicy::Enqueue)]
//!     }
//!     fn instantiate(
//!         &self,
//!         _ctx: &InstantiateContext<'_>,
//!     ) -> Result<Box<dyn NodeBehavior>, NodeError> {
//!         Ok(Box::new(Trigger))
//!     }
//! }
//!
//! let mut graph = CompositionGraph::new("Example");
//! graph.add_node("T", "trigger", false, &TriggerClass.ports()).unwrap();
//! let schedule = graph.compile().unwrap();
//!
//! let mut classes: HashMap<String, Arc<dyn NodeClass>> = HashMap::new();
//! classes.insert("trigger".into(), Arc::new(TriggerClass));
//!
//! let runner = Runner::build(schedule, Arc::new(classes), RuntimeConfig::default()).unwrap();
//! runner.start().unwrap();
//! runner.fire_trigger_port_event_with_value("T:fired", 1.into()).unwrap();
//! runner.wait_for_fired_event();
//! assert_eq!(runner.stats().completed, 1);
//! runner.stop();
//! ```

mod admission;
pub mod composition;
pub mod config;
mod directory;
pub mod error;
pub mod event;
mod executor;
mod instance;
pub mod node;
mod propagator;
pub mod runner;
pub mod stats;
pub mod subcomposition;
pub mod telemetry;
mod worker;

pub use composition::CompositionInstance;
pub use config::RuntimeConfig;
pub use error::{ControlError, NodeError, RuntimeError};
pub use event::{Admission, Event, EventId, Pass};
pub use instance::LifecycleState;
pub use node::{
    InstantiateContext, NodeBehavior, NodeClass, NodeClassResolver, NodeContext, NodeDescriptor,
    TriggerHandle, TriggerHandles,
};
pub use runner::Runner;
pub use stats::StatsSnapshot;
pub use subcomposition::SubcompositionClass;
pub use telemetry::{
    SubscriptionKind, TelemetryEmitter, TelemetryHub, TelemetryRecord, TelemetrySubscription,
};
