//! Cable types.
//!
//! A [`Cable`] connects an output port to an input port. It always carries
//! events; it carries data too when both ends are data ports. A cable marked
//! `feedback` closes a cycle and delivers its value only after the forward pass
//! of a firing has finished.

use super::node::NodeId;
use super::port::PortId;

/// Unique identifier for a cable in a composition graph.
///
/// Cable IDs are assigned sequentially and never reused within a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CableId(pub(crate) u32);

impl CableId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CableId({})", self.0)
    }
}

/// A directed connection from an output port to an input port.
#[derive(Debug, Clone)]
pub struct Cable {
    pub(crate) id: CableId,
    pub(crate) from: PortId,
    pub(crate) to: PortId,
    pub(crate) from_node: NodeId,
    pub(crate) to_node: NodeId,
    pub(crate) carries_data: bool,
    pub(crate) feedback: bool,
}

impl Cable {
    /// Cable identifier.
    pub fn id(&self) -> CableId {
        self.id
    }

    /// Source (output) port.
    pub fn from(&self) -> PortId {
        self.from
    }

    /// Destination (input) port.
    pub fn to(&self) -> PortId {
        self.to
    }

    /// Node owning the source port.
    pub fn from_node(&self) -> NodeId {
        self.from_node
    }

    /// Node owning the destination port.
    pub fn to_node(&self) -> NodeId {
        self.to_node
    }

    /// `true` if the cable carries data along with the event.
    pub fn carries_data(&self) -> bool {
        self.carries_data
    }

    /// `true` if this is the cycle-closing feedback cable.
    pub fn is_feedback(&self) -> bool {
        self.feedback
    }
}
