//! Feed pump task.
//!
//! Drains one user's feed subscription into the store until cancelled.
//! A dropped transport is not fatal: the store keeps serving last-known
//! state while the runner re-subscribes with exponential backoff, and the
//! gap is treated as a potential event-loss window that an optional resync
//! (re-running the initial fetch) closes.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::FeedSignal;
use super::provider::{FeedProvider, FeedSubscription};
use crate::backend::InboxBackend;
use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::store::NotificationStore;

pub(crate) struct FeedRunner {
    store: Arc<NotificationStore>,
    backend: Arc<dyn InboxBackend>,
    provider: Arc<dyn FeedProvider>,
    receiver_id: String,
    config: FeedConfig,
}

impl FeedRunner {
    pub(crate) fn new(
        store: Arc<NotificationStore>,
        backend: Arc<dyn InboxBackend>,
        provider: Arc<dyn FeedProvider>,
        receiver_id: impl Into<String>,
        config: FeedConfig,
    ) -> Self {
        Self {
            store,
            backend,
            provider,
            receiver_id: receiver_id.into(),
            config,
        }
    }

    /// Run the pump loop until cancelled or reconnection is exhausted.
    pub(crate) async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut subscription = self.provider.subscribe(&self.receiver_id).await?;
        debug!(receiver_id = %self.receiver_id, "notification feed subscribed");
        // Set after a Disconnected signal; the next Connected resyncs.
        let mut pending_resync = false;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(receiver_id = %self.receiver_id, "notification feed runner cancelled");
                    return Ok(());
                }

                signal = subscription.recv() => match signal {
                    Some(FeedSignal::Change(event)) => {
                        self.store.apply_remote_event(event);
                    }
                    Some(FeedSignal::Connected) => {
                        if pending_resync {
                            pending_resync = false;
                            self.resync().await;
                        }
                    }
                    Some(FeedSignal::Disconnected { reason }) => {
                        warn!(receiver_id = %self.receiver_id, %reason, "notification feed disconnected");
                        pending_resync = self.config.resync_on_reconnect;
                    }
                    None => {
                        // Provider dropped its side; rebuild the subscription.
                        subscription = self.resubscribe(&cancel).await?;
                        if self.config.resync_on_reconnect {
                            self.resync().await;
                        }
                    }
                }
            }
        }
    }

    /// Re-run the initial fetch to close the event-loss window after a gap.
    /// Failure keeps serving last-known state rather than tearing down.
    async fn resync(&self) {
        match self.backend.fetch_all(&self.receiver_id).await {
            Ok(set) => {
                info!(receiver_id = %self.receiver_id, total = set.len(), "resynced after feed gap");
                self.store.load(&self.receiver_id, set);
            }
            Err(error) => {
                warn!(receiver_id = %self.receiver_id, %error, "resync failed, serving last-known state");
            }
        }
    }

    async fn resubscribe(&self, cancel: &CancellationToken) -> Result<FeedSubscription> {
        let mut delay = Duration::from_millis(self.config.initial_reconnect_delay_ms);
        let max_delay = Duration::from_millis(self.config.max_reconnect_delay_ms);

        for attempt in 1..=self.config.max_reconnect_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::disconnect("cancelled during reconnect"));
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.provider.subscribe(&self.receiver_id).await {
                Ok(subscription) => {
                    info!(receiver_id = %self.receiver_id, attempt, "notification feed re-subscribed");
                    return Ok(subscription);
                }
                Err(error) => {
                    warn!(receiver_id = %self.receiver_id, attempt, %error, "feed re-subscribe failed");
                    delay = (delay * 2).min(max_delay);
                }
            }
        }

        Err(Error::disconnect(format!(
            "gave up after {} reconnect attempts",
            self.config.max_reconnect_attempts
        )))
    }
}
