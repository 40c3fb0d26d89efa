//! Events and admission outcomes.

/// Instance-wide unique identifier of one firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) u64);

impl EventId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

/// Token for one firing of one trigger.
///
/// `sequence` increases by one for every admitted firing of the same trigger,
/// starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Event {
    pub(crate) id: EventId,
    pub(crate) sequence: u64,
}

impl Event {
    /// Unique event id.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Per-trigger sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Outcome of a firing request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The trigger was idle; the firing starts right away.
    Admitted(Event),
    /// Another firing of this trigger is in flight; this one waits its turn.
    Queued(Event),
    /// `Drop` policy and the trigger was busy; the firing was discarded.
    Dropped,
}

impl Admission {
    /// The admitted event, unless dropped.
    pub fn event(&self) -> Option<Event> {
        match self {
            Self::Admitted(e) | Self::Queued(e) => Some(*e),
            Self::Dropped => None,
        }
    }

    /// `true` unless the firing was dropped.
    pub fn is_admitted(&self) -> bool {
        !self.is_dropped()
    }

    /// `true` if the firing was dropped.
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped)
    }
}

/// Which pass of a firing a node execution belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    /// The topological walk of the trigger's order.
    Forward,
    /// The final pass delivering feedback-cable values.
    Feedback,
}
