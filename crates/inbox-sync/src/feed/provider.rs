//! Feed channel provider trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::events::FeedSignal;
use crate::error::Result;

/// Default buffer for a subscription's signal channel.
pub const DEFAULT_SIGNAL_BUFFER: usize = 64;

/// An active subscription to one user's notification change feed.
///
/// Dropping the subscription tears the channel down; the provider observes
/// the closed channel and releases transport resources.
#[derive(Debug)]
pub struct FeedSubscription {
    signals: mpsc::Receiver<FeedSignal>,
}

impl FeedSubscription {
    /// Create a paired sender/subscription for providers and tests.
    pub fn channel(buffer: usize) -> (mpsc::Sender<FeedSignal>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { signals: rx })
    }

    /// Receive the next signal in delivery order. Returns None when the
    /// provider dropped its side of the channel.
    pub async fn recv(&mut self) -> Option<FeedSignal> {
        self.signals.recv().await
    }
}

/// Provider of server-pushed entity-change feeds.
///
/// Delivery contract: per-entity ordering only, at-least-once. The
/// subscription may interleave `Connected`/`Disconnected` transitions with
/// changes when the underlying transport reconnects on its own.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    /// Open a change feed scoped to one user's notification set.
    async fn subscribe(&self, receiver_id: &str) -> Result<FeedSubscription>;
}
