//! Telemetry: node-execution and port-update records for subscribers.
//!
//! A [`TelemetryHub`] is shared by a whole composition tree. Each instance
//! reports through a [`TelemetryEmitter`] that stamps records with the
//! instance's [`CompositionIdentifier`]; subcompositions derive their emitter
//! with [`TelemetryEmitter::child()`], so one subscription scoped to `Top/Sub`
//! sees `Top/Sub` and everything nested below it.
//!
//! Subscribers receive records over unbounded crossbeam channels. Publishing
//! never blocks the emitting worker. A subscriber whose
//! [`TelemetrySubscription`] has been dropped is pruned on the next publish.
//!
//! Port-value summaries are computed only when some subscriber that wants them
//! is in scope; event-only subscriptions receive records with `summary: None`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use parking_lot::RwLock;
use sluice_core::{CompositionIdentifier, PortValue};

/// One telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryRecord {
    /// A node began executing.
    NodeExecutionStarted {
        /// Composition the node belongs to.
        composition: CompositionIdentifier,
        /// Node name.
        node: String,
    },
    /// A node finished executing.
    NodeExecutionFinished {
        /// Composition the node belongs to.
        composition: CompositionIdentifier,
        /// Node name.
        node: String,
    },
    /// A port sent or received an event and/or data.
    PortUpdated {
        /// Composition the port belongs to.
        composition: CompositionIdentifier,
        /// Port identifier, `Node:port`.
        port: String,
        /// An event passed through the port.
        sent_event: bool,
        /// The port's data changed.
        sent_data: bool,
        /// Short description of the value, when requested by the subscriber.
        summary: Option<String>,
    },
    /// A `Drop`-policy trigger discarded a firing.
    EventDropped {
        /// Composition the trigger belongs to.
        composition: CompositionIdentifier,
        /// Trigger identifier.
        port: String,
    },
    /// A node failed; the composition is shutting down.
    ErrorOccurred {
        /// Composition where the failure happened.
        composition: CompositionIdentifier,
        /// Error message.
        message: String,
    },
    /// The composition is stopping.
    CompositionStopping {
        /// Composition being stopped.
        composition: CompositionIdentifier,
    },
}

impl TelemetryRecord {
    /// Composition the record was emitted by.
    pub fn composition(&self) -> &CompositionIdentifier {
        match self {
            Self::NodeExecutionStarted { composition, .. }
            | Self::NodeExecutionFinished { composition, .. }
            | Self::PortUpdated { composition, .. }
            | Self::EventDropped { composition, .. }
            | Self::ErrorOccurred { composition, .. }
            | Self::CompositionStopping { composition } => composition,
        }
    }

    /// Port identifier for port records.
    pub fn port(&self) -> Option<&str> {
        match self {
            Self::PortUpdated { port, .. } | Self::EventDropped { port, .. } => Some(port),
            _ => None,
        }
    }
}

/// What a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Every record in scope, port summaries stripped.
    Events,
    /// Port updates of one port (with summaries) in exactly the scoped
    /// composition.
    Port(String),
    /// Every record in scope, with summaries.
    All,
}

struct Subscriber {
    id: u64,
    scope: CompositionIdentifier,
    kind: SubscriptionKind,
    sender: Sender<TelemetryRecord>,
}

impl Subscriber {
    /// Whether this subscriber receives `record`, and whether with summary.
    fn accepts(&self, record: &TelemetryRecord) -> Option<bool> {
        if let TelemetryRecord::ErrorOccurred { .. } = record {
            return Some(false);
        }
        let composition = record.composition();
        match &self.kind {
            SubscriptionKind::Events => composition.is_within(&self.scope).then_some(false),
            SubscriptionKind::All => composition.is_within(&self.scope).then_some(true),
            SubscriptionKind::Port(port) => match record {
                TelemetryRecord::PortUpdated { port: p, .. }
                    if p == port && *composition == self.scope =>
                {
                    Some(true)
                }
                _ => None,
            },
        }
    }

    fn wants_summary(&self, composition: &CompositionIdentifier, port: &str) -> bool {
        match &self.kind {
            SubscriptionKind::Events => false,
            SubscriptionKind::All => composition.is_within(&self.scope),
            SubscriptionKind::Port(p) => p == port && *composition == self.scope,
        }
    }
}

/// Fan-out point for telemetry records.
pub struct TelemetryHub {
    subscribers: RwLock<Vec<Subscriber>>,
    count: AtomicUsize,
    next_id: AtomicU64,
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            count: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }
}

impl std::fmt::Debug for TelemetryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl TelemetryHub {
    /// Creates a hub with no subscribers.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribes to records from `scope` and its descendants.
    pub fn subscribe(
        self: &Arc<Self>,
        scope: CompositionIdentifier,
        kind: SubscriptionKind,
    ) -> TelemetrySubscription {
        let (sender, receiver) = unbounded();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push(Subscriber {
            id,
            scope,
            kind,
            sender,
        });
        self.count.fetch_add(1, Ordering::Release);
        TelemetrySubscription {
            id,
            receiver,
            hub: Arc::downgrade(self),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        self.count
            .fetch_sub(before - subscribers.len(), Ordering::Release);
    }

    #[inline]
    fn is_idle(&self) -> bool {
        self.subscriber_count() == 0
    }

    fn publish(&self, record: &TelemetryRecord) {
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for sub in subscribers.iter() {
                let Some(with_summary) = sub.accepts(record) else {
                    continue;
                };
                let sent = if with_summary {
                    sub.sender.send(record.clone())
                } else {
                    sub.sender.send(strip_summary(record))
                };
                if sent.is_err() {
                    dead.push(sub.id);
                }
            }
        }
        for id in dead {
            self.unsubscribe(id);
        }
    }

    fn wants_summary(&self, composition: &CompositionIdentifier, port: &str) -> bool {
        self.subscribers
            .read()
            .iter()
            .any(|s| s.wants_summary(composition, port))
    }
}

fn strip_summary(record: &TelemetryRecord) -> TelemetryRecord {
    match record {
        TelemetryRecord::PortUpdated {
            composition,
            port,
            sent_event,
            sent_data,
            summary: Some(_),
        } => TelemetryRecord::PortUpdated {
            composition: composition.clone(),
            port: port.clone(),
            sent_event: *sent_event,
            sent_data: *sent_data,
            summary: None,
        },
        other => other.clone(),
    }
}

/// Receiving end of a telemetry subscription. Dropping it unsubscribes.
pub struct TelemetrySubscription {
    id: u64,
    receiver: Receiver<TelemetryRecord>,
    hub: std::sync::Weak<TelemetryHub>,
}

impl TelemetrySubscription {
    /// Blocks until the next record arrives.
    pub fn recv(&self) -> Option<TelemetryRecord> {
        self.receiver.recv().ok()
    }

    /// Waits up to `timeout` for the next record.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TelemetryRecord> {
        match self.receiver.recv_timeout(timeout) {
            Ok(record) => Some(record),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Returns the next record if one is ready.
    pub fn try_recv(&self) -> Option<TelemetryRecord> {
        match self.receiver.try_recv() {
            Ok(record) => Some(record),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Takes every record received so far.
    pub fn drain(&self) -> Vec<TelemetryRecord> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for TelemetrySubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

/// Telemetry reporter bound to one composition instance.
#[derive(Clone, Debug)]
pub struct TelemetryEmitter {
    hub: Arc<TelemetryHub>,
    composition: CompositionIdentifier,
    summary_max_len: usize,
}

impl TelemetryEmitter {
    /// Creates an emitter for `composition`.
    pub fn new(
        hub: Arc<TelemetryHub>,
        composition: CompositionIdentifier,
        summary_max_len: usize,
    ) -> Self {
        Self {
            hub,
            composition,
            summary_max_len,
        }
    }

    /// Emitter for the subcomposition instantiated as node `name`.
    pub fn child(&self, name: &str) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            composition: self.composition.child(name),
            summary_max_len: self.summary_max_len,
        }
    }

    /// Composition this emitter reports for.
    pub fn composition(&self) -> &CompositionIdentifier {
        &self.composition
    }

    /// Shared hub.
    pub fn hub(&self) -> &Arc<TelemetryHub> {
        &self.hub
    }

    /// Reports that `node` started executing.
    pub fn node_started(&self, node: &str) {
        if self.hub.is_idle() {
            return;
        }
        self.hub.publish(&TelemetryRecord::NodeExecutionStarted {
            composition: self.composition.clone(),
            node: node.to_string(),
        });
    }

    /// Reports that `node` finished executing.
    pub fn node_finished(&self, node: &str) {
        if self.hub.is_idle() {
            return;
        }
        self.hub.publish(&TelemetryRecord::NodeExecutionFinished {
            composition: self.composition.clone(),
            node: node.to_string(),
        });
    }

    /// Reports a port update.
    pub fn port_updated(&self, port: &str, sent_event: bool, sent_data: bool, value: &PortValue) {
        if self.hub.is_idle() {
            return;
        }
        let summary = (sent_data && self.hub.wants_summary(&self.composition, port))
            .then(|| value.summary(self.summary_max_len));
        self.hub.publish(&TelemetryRecord::PortUpdated {
            composition: self.composition.clone(),
            port: port.to_string(),
            sent_event,
            sent_data,
            summary,
        });
    }

    /// Reports a dropped firing.
    pub fn event_dropped(&self, port: &str) {
        if self.hub.is_idle() {
            return;
        }
        self.hub.publish(&TelemetryRecord::EventDropped {
            composition: self.composition.clone(),
            port: port.to_string(),
        });
    }

    /// Reports a fatal error.
    pub fn error(&self, message: &str) {
        if self.hub.is_idle() {
            return;
        }
        self.hub.publish(&TelemetryRecord::ErrorOccurred {
            composition: self.composition.clone(),
            message: message.to_string(),
        });
    }

    /// Reports that the composition is stopping.
    pub fn stopping(&self) {
        if self.hub.is_idle() {
            return;
        }
        self.hub.publish(&TelemetryRecord::CompositionStopping {
            composition: self.composition.clone(),
        });
    }
}
