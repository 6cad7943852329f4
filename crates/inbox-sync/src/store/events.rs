//! Store change events and their broadcaster.
//!
//! Every completed store mutation publishes exactly one event. Display
//! surfaces and the auto-acknowledge timer subscribe independently; no
//! ordering dependency exists between listeners.

use tokio::sync::broadcast;

use crate::error::CommitOp;
use crate::feed::ChangeOp;

/// Events emitted by the notification store, one per completed mutation.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The collection was replaced wholesale from an authoritative fetch.
    Loaded { total: usize, unread: usize },
    /// A remote feed event was merged into the collection.
    RemoteChanged {
        op: ChangeOp,
        id: String,
        unread: usize,
    },
    /// A local optimistic mark-read was applied.
    MarkedRead { id: String, unread: usize },
    /// A local optimistic mark-all-read batch was applied.
    MarkedAllRead { count: usize, unread: usize },
    /// A local optimistic delete was applied.
    Removed { id: String, unread: usize },
    /// A failed commit was rolled back.
    RolledBack { op: CommitOp, unread: usize },
    /// The store was torn down at session end.
    Reset,
}

impl StoreEvent {
    /// Unread count after the mutation, where one applies.
    pub fn unread(&self) -> Option<usize> {
        match self {
            Self::Loaded { unread, .. }
            | Self::RemoteChanged { unread, .. }
            | Self::MarkedRead { unread, .. }
            | Self::MarkedAllRead { unread, .. }
            | Self::Removed { unread, .. }
            | Self::RolledBack { unread, .. } => Some(*unread),
            Self::Reset => None,
        }
    }

    /// Whether this event is a user-initiated action that pre-empts a
    /// pending auto-acknowledge cycle.
    pub fn cancels_auto_ack(&self) -> bool {
        matches!(self, Self::MarkedAllRead { .. } | Self::Removed { .. })
    }
}

/// Broadcaster for store events.
pub struct StoreEventBroadcaster {
    sender: broadcast::Sender<StoreEvent>,
}

impl StoreEventBroadcaster {
    /// Create a new broadcaster with default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new broadcaster with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to store events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publish a store event. A send error only means there are no
    /// subscribers right now, so it is ignored.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StoreEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StoreEventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
