//! Session wiring for the synchronization engine.
//!
//! Ties the store, the feed runner, and the auto-acknowledge timer to one
//! authenticated user's session: start fetches the authoritative set and
//! spawns the feed pump, shutdown cancels the pump and tears the store
//! down. Switching users is a shutdown followed by a fresh start.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ack::AutoAcknowledgeTimer;
use crate::backend::InboxBackend;
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::feed::{FeedProvider, FeedRunner};
use crate::store::NotificationStore;

struct Session {
    receiver_id: String,
    cancel: CancellationToken,
    runner: JoinHandle<()>,
}

/// Owns one user session's notification synchronization.
pub struct NotificationSyncService {
    config: SyncConfig,
    backend: Arc<dyn InboxBackend>,
    provider: Arc<dyn FeedProvider>,
    store: Arc<NotificationStore>,
    auto_ack: AutoAcknowledgeTimer,
    session: Mutex<Option<Session>>,
}

impl NotificationSyncService {
    pub fn new(
        backend: Arc<dyn InboxBackend>,
        provider: Arc<dyn FeedProvider>,
        config: SyncConfig,
    ) -> Self {
        let store = Arc::new(NotificationStore::with_config(backend.clone(), &config));
        let auto_ack = AutoAcknowledgeTimer::new(store.clone(), config.auto_ack_dwell);
        Self {
            config,
            backend,
            provider,
            store,
            auto_ack,
            session: Mutex::new(None),
        }
    }

    /// The store display surfaces subscribe to.
    pub fn store(&self) -> Arc<NotificationStore> {
        self.store.clone()
    }

    /// The single auto-acknowledge timer for this store.
    pub fn auto_ack(&self) -> &AutoAcknowledgeTimer {
        &self.auto_ack
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Begin a session for `receiver_id`: subscribe the feed, then run the
    /// initial fetch and load the store. An existing session is shut down
    /// first.
    ///
    /// A fetch failure is surfaced to the caller and is not retried
    /// internally; the feed stays subscribed so the session can still
    /// converge through remote events, but the store starts empty.
    pub async fn start(&self, receiver_id: &str) -> Result<()> {
        self.shutdown().await;

        let cancel = CancellationToken::new();
        let runner = FeedRunner::new(
            self.store.clone(),
            self.backend.clone(),
            self.provider.clone(),
            receiver_id,
            self.config.feed.clone(),
        );
        let runner = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(error) = runner.run(cancel).await {
                    warn!(%error, "notification feed runner stopped");
                }
            })
        };
        *self.session.lock() = Some(Session {
            receiver_id: receiver_id.to_string(),
            cancel,
            runner,
        });
        info!(receiver_id, "notification session started");

        match self.backend.fetch_all(receiver_id).await {
            Ok(initial) => {
                self.store.load(receiver_id, initial);
                Ok(())
            }
            Err(error) => Err(Error::fetch(error.to_string())),
        }
    }

    /// End the current session, if any: cancel the feed pump, cancel any
    /// pending auto-acknowledge cycle, and reset the store.
    pub async fn shutdown(&self) {
        let session = self.session.lock().take();
        let Some(session) = session else {
            return;
        };

        self.auto_ack.cancel();
        session.cancel.cancel();
        if session.runner.await.is_err() {
            warn!("notification feed runner panicked during shutdown");
        }
        self.store.reset();
        info!(receiver_id = %session.receiver_id, "notification session ended");
    }
}
