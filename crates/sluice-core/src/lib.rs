//! Core data model for the sluice composition event scheduler.
//!
//! A composition is a graph of nodes whose ports are joined by cables. Events
//! originate at trigger ports and travel along cables; this crate describes
//! that graph and compiles it, once, into an immutable [`GraphSchedule`] that
//! the runtime walks for every firing.
//!
//! # Modules
//!
//! - [`graph`]: [`CompositionGraph`] builder, validation, and the compiled
//!   [`GraphSchedule`] with one [`TriggerSchedule`] per trigger port.
//! - [`value`]: [`PortValue`], the dynamically typed data carried by cables.
//! - [`identifier`]: [`CompositionIdentifier`], the `/`-joined path that
//!   scopes nested (sub)composition instances.
//!
//! # Example
//!
//! ```rust
//! use sluice_core::{CompositionGraph, EventBlocking, PortDecl, SchedulingPolicy};
//!
//! let mut graph = CompositionGraph::new("Example");
//! let fire = graph
//!     .add_node("Fire", "fire_on_request", false, &[
//!         PortDecl::trigger("fired", SchedulingPolicy::Enqueue),
//!     ])
//!     .unwrap();
//! let hold = graph
//!     .add_node("Hold", "hold_value", true, &[
//!         PortDecl::input("new_value").with_blocking(EventBlocking::Wall),
//!         PortDecl::output("held"),
//!     ])
//!     .unwrap();
//!
//! let from = graph.port(fire, "fired").unwrap();
//! let to = graph.port(hold, "new_value").unwrap();
//! graph.connect(from, to).unwrap();
//!
//! let schedule = graph.compile().unwrap();
//! assert_eq!(schedule.triggers().len(), 1);
//! ```

pub mod graph;
pub mod identifier;
pub mod value;

pub use graph::{
    Cable, CableId, CompositionGraph, Direction, EventBlocking, GraphError, GraphSchedule, Node,
    NodeId, PUBLISHED_INPUTS_CLASS, PUBLISHED_INPUTS_NODE, Port, PortDecl, PortId, PublishedPort,
    ScheduleDiff, SchedulingPolicy, TriggerId, TriggerSchedule,
};
pub use identifier::{CompositionIdentifier, IdentifierError};
pub use value::PortValue;
