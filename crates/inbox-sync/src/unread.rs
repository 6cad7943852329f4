//! Single source of truth for the unread count.
//!
//! Every display surface (header badge, sidebar badge, list header) reads
//! the same published value instead of re-deriving its own copy.

use tokio::sync::watch;

/// Broadcasts the derived unread count to any number of display surfaces.
///
/// The value is a pure function of the store's collection; the store
/// publishes a fresh value as part of every completed mutation, so a
/// subscriber can never observe a count older than the last mutation.
#[derive(Debug)]
pub struct UnreadCountPublisher {
    tx: watch::Sender<usize>,
}

impl UnreadCountPublisher {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Current unread count, readable synchronously between notifications.
    pub fn current(&self) -> usize {
        *self.tx.borrow()
    }

    /// Subscribe to count changes.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish a freshly derived count. Subscribers are only woken when the
    /// value actually changed.
    pub(crate) fn publish(&self, count: usize) {
        self.tx.send_if_modified(|current| {
            if *current != count {
                *current = count;
                true
            } else {
                false
            }
        });
    }
}

impl Default for UnreadCountPublisher {
    fn default() -> Self {
        Self::new()
    }
}
