//! Composition graph and per-trigger schedules.
//!
//! # Architecture
//!
//! The module uses a **two-object split**:
//!
//! - [`CompositionGraph`]: mutable builder. Holds nodes, ports, and cables,
//!   validates connections, and runs [`compile()`](CompositionGraph::compile).
//! - [`GraphSchedule`]: immutable snapshot shared with every worker via `Arc`.
//!   Holds one [`TriggerSchedule`] per trigger: the topological order of the
//!   nodes that trigger can reach, and the feedback cables it may fire.
//!
//! # Feedback
//!
//! A cycle is legal only if one of its cables is marked feedback. Ordering is
//! computed over regular cables alone, so every trigger order is a valid
//! topological sort; feedback cables are delivered in a second, final pass.
//!
//! # Determinism
//!
//! Kahn's sort breaks ties by lowest node id, so two compilations of the same
//! graph produce identical orders. Scatter branches therefore always execute in
//! the same order for a given trigger.

mod builder;
pub mod cable;
pub mod diff;
pub mod node;
pub mod port;
pub mod schedule;

pub use builder::{CompositionGraph, GraphError};
pub use cable::{Cable, CableId};
pub use diff::ScheduleDiff;
pub use node::{Node, NodeId, PUBLISHED_INPUTS_CLASS, PUBLISHED_INPUTS_NODE};
pub use port::{
    Direction, EventBlocking, Port, PortDecl, PortId, SchedulingPolicy, port_identifier,
    split_port_identifier,
};
pub use schedule::{GraphSchedule, PublishedPort, TriggerId, TriggerSchedule};
