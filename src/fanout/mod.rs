//! Transport fan-out.
//!
//! # Data Flow
//! ```text
//! relay controller (one logical event)
//!     → serialize once
//!     → SubscriberRegistry(WebSocket).broadcast(line)
//!     → SubscriberRegistry(Stream).broadcast(line)
//!     → per-subscriber unbounded channel
//!     → transport writer task (WS frame / TCP line)
//! ```
//!
//! # Design Decisions
//! - One owned registry object per transport kind; no ambient shared
//!   state. The controller holds both through `FanOut`.
//! - Fire-and-forget: a send is an in-memory enqueue, never an awaited
//!   delivery, so one transport's slow consumer cannot block the other.
//! - A failed send means the subscriber's writer is gone; the entry is
//!   pruned on the spot. Missed events are recovered via bootstrap on
//!   the next connect, never replayed.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::observability::metrics;

/// The two live transport channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    WebSocket,
    Stream,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Stream => "stream",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identity of a connected subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Connected subscribers of one transport kind.
#[derive(Debug)]
pub struct SubscriberRegistry {
    kind: TransportKind,
    peers: DashMap<SubscriberId, mpsc::UnboundedSender<String>>,
}

impl SubscriberRegistry {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            peers: DashMap::new(),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Register a subscriber's outbound channel.
    pub fn add(&self, id: SubscriberId, tx: mpsc::UnboundedSender<String>) {
        self.peers.insert(id, tx);
        metrics::set_subscribers(self.kind, self.peers.len());
        tracing::info!(transport = %self.kind, subscriber = %id, total = self.peers.len(), "Subscriber connected");
    }

    /// Drop a subscriber; no delivery is attempted afterwards.
    pub fn remove(&self, id: SubscriberId) {
        if self.peers.remove(&id).is_some() {
            metrics::set_subscribers(self.kind, self.peers.len());
            tracing::info!(transport = %self.kind, subscriber = %id, total = self.peers.len(), "Subscriber disconnected");
        }
    }

    /// Enqueue a frame to one subscriber. Returns false (and prunes the
    /// entry) if its writer is gone.
    pub fn send(&self, id: SubscriberId, line: &str) -> bool {
        let delivered = match self.peers.get(&id) {
            Some(tx) => tx.send(line.to_string()).is_ok(),
            None => false,
        };
        if !delivered {
            metrics::record_broadcast_failure(self.kind);
            self.remove(id);
        }
        delivered
    }

    /// Enqueue a frame to every connected subscriber of this transport.
    pub fn broadcast(&self, line: &str) {
        let mut dead = Vec::new();
        for peer in self.peers.iter() {
            if peer.value().send(line.to_string()).is_err() {
                dead.push(*peer.key());
            }
        }
        for id in dead {
            metrics::record_broadcast_failure(self.kind);
            self.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Both transport registries, delivered to as one logical audience.
#[derive(Debug)]
pub struct FanOut {
    websocket: SubscriberRegistry,
    stream: SubscriberRegistry,
}

impl FanOut {
    pub fn new() -> Self {
        Self {
            websocket: SubscriberRegistry::new(TransportKind::WebSocket),
            stream: SubscriberRegistry::new(TransportKind::Stream),
        }
    }

    pub fn registry(&self, kind: TransportKind) -> &SubscriberRegistry {
        match kind {
            TransportKind::WebSocket => &self.websocket,
            TransportKind::Stream => &self.stream,
        }
    }

    /// Deliver one pre-serialized event to every subscriber on both
    /// transports.
    pub fn broadcast_all(&self, line: &str) {
        self.websocket.broadcast(line);
        self.stream.broadcast(line);
    }

    pub fn subscriber_count(&self) -> usize {
        self.websocket.len() + self.stream.len()
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new()
    }
}
