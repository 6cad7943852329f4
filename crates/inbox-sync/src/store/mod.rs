//! Canonical notification store.
//!
//! Owns the ordered collection and all mutation logic: merging remote feed
//! events, optimistic local edits with rollback, and the derived unread
//! count. Mutations update in-memory state and notify subscribers in one
//! synchronous step under the state lock, so no other mutation can observe
//! a half-applied change; only the commit round-trip is asynchronous.

mod events;
mod optimistic;

pub use events::{StoreEvent, StoreEventBroadcaster};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::InboxBackend;
use crate::collection::NotificationCollection;
use crate::config::{Pagination, SyncConfig};
use crate::error::{Error, Result};
use crate::feed::{ChangeEvent, ChangeOp};
use crate::model::Notification;
use crate::unread::UnreadCountPublisher;
use optimistic::{OptimisticPatch, OptimisticToken, RevertOutcome};

struct StoreInner {
    collection: NotificationCollection,
    /// The user this collection belongs to, set by `load`.
    receiver_id: Option<String>,
    /// Monotonic mutation counter, used to order remote writes against
    /// in-flight optimistic commits.
    revision: u64,
    /// Session counter; bumped by `load` and `reset` so commit resolutions
    /// from a previous session resolve into nothing.
    epoch: u64,
    /// Last remote-write revision per entity id.
    remote_writes: HashMap<String, u64>,
}

impl StoreInner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// The canonical in-memory notification set for the current user.
pub struct NotificationStore {
    inner: Mutex<StoreInner>,
    backend: Arc<dyn InboxBackend>,
    events: StoreEventBroadcaster,
    unread: UnreadCountPublisher,
    pagination: Pagination,
}

impl NotificationStore {
    /// Create an empty store with default configuration.
    pub fn new(backend: Arc<dyn InboxBackend>) -> Self {
        Self::with_config(backend, &SyncConfig::default())
    }

    /// Create an empty store with explicit configuration.
    pub fn with_config(backend: Arc<dyn InboxBackend>, config: &SyncConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                collection: NotificationCollection::new(),
                receiver_id: None,
                revision: 0,
                epoch: 0,
                remote_writes: HashMap::new(),
            }),
            backend,
            events: StoreEventBroadcaster::with_capacity(config.event_capacity),
            unread: UnreadCountPublisher::new(),
            pagination: config.pagination,
        }
    }

    /// Subscribe to store change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// The unread count publisher shared by all badge surfaces.
    pub fn unread(&self) -> &UnreadCountPublisher {
        &self.unread
    }

    pub fn len(&self) -> usize {
        self.inner.lock().collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().collection.is_empty()
    }

    /// Clone of one entity.
    pub fn get(&self, id: &str) -> Option<Notification> {
        self.inner.lock().collection.get(id).cloned()
    }

    /// Read-only snapshot of the whole collection in display order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner.lock().collection.as_slice().to_vec()
    }

    /// The first `limit` entities in display order.
    pub fn page(&self, limit: usize) -> Vec<Notification> {
        let inner = self.inner.lock();
        let slice = inner.collection.as_slice();
        slice[..limit.min(slice.len())].to_vec()
    }

    /// The initial page a list view renders before any "load more".
    pub fn first_page(&self) -> Vec<Notification> {
        self.page(self.pagination.initial_limit)
    }

    /// Whether entities beyond `limit` exist.
    pub fn has_more(&self, limit: usize) -> bool {
        self.inner.lock().collection.len() > limit
    }

    /// Paging tunables for display surfaces.
    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Replace the collection wholesale from the authoritative initial
    /// fetch, binding the store to `receiver_id`. Voids any in-flight
    /// optimistic tokens.
    pub fn load(&self, receiver_id: &str, initial: Vec<Notification>) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.next_revision();
        inner.remote_writes.clear();
        inner.receiver_id = Some(receiver_id.to_string());
        inner.collection.replace_all(initial);
        let total = inner.collection.len();
        let unread = inner.collection.unread_count();
        info!(receiver_id, total, unread, "notification store loaded");
        self.finish_mutation(&inner, StoreEvent::Loaded { total, unread });
    }

    /// Tear the store down at session end. Later commit resolutions from
    /// the old session are discarded.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.next_revision();
        inner.remote_writes.clear();
        inner.receiver_id = None;
        inner.collection.clear();
        debug!("notification store reset");
        self.finish_mutation(&inner, StoreEvent::Reset);
    }

    /// Merge one remote feed event into the collection.
    ///
    /// Insert for a known id degrades to an update and delete of an absent
    /// id is a no-op, so duplicate or replayed delivery is harmless. An
    /// update for an unknown id inserts instead of dropping, so an event
    /// that raced the initial load cannot cause an undercount. Exactly one
    /// notification goes out per call.
    pub fn apply_remote_event(&self, event: ChangeEvent) {
        let mut inner = self.inner.lock();
        let revision = inner.next_revision();
        let id = event.entity.id.clone();
        inner.remote_writes.insert(id.clone(), revision);

        match event.op {
            ChangeOp::Insert | ChangeOp::Update => {
                let inserted = inner.collection.upsert(event.entity);
                debug!(op = %event.op, id, inserted, "remote change merged");
            }
            ChangeOp::Delete => {
                let removed = inner.collection.remove(&id).is_some();
                debug!(id, removed, "remote delete merged");
            }
        }

        let unread = inner.collection.unread_count();
        self.finish_mutation(
            &inner,
            StoreEvent::RemoteChanged {
                op: event.op,
                id,
                unread,
            },
        );
    }

    /// Optimistically mark one notification read, then commit.
    ///
    /// Already-viewed entities are a no-op; unknown ids are an error. On
    /// commit failure the flag is rolled back (unless a remote write
    /// superseded it) and the failure is surfaced to the caller.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        let token = {
            let mut inner = self.inner.lock();
            match inner.collection.get(id) {
                None => return Err(Error::not_found(id)),
                Some(current) if current.viewed => return Ok(()),
                Some(_) => {}
            }
            let revision = inner.next_revision();
            inner.collection.set_viewed(id, true);
            let unread = inner.collection.unread_count();
            self.finish_mutation(
                &inner,
                StoreEvent::MarkedRead {
                    id: id.to_string(),
                    unread,
                },
            );
            OptimisticToken {
                epoch: inner.epoch,
                revision,
                patch: OptimisticPatch::MarkRead { id: id.to_string() },
            }
        };

        match self.backend.commit_mark_read(id).await {
            Ok(()) => {
                self.confirm(token);
                Ok(())
            }
            Err(err) => Err(self.revert(token, err)),
        }
    }

    /// Optimistically flip every unread notification in one batch, then
    /// issue one all-or-nothing batch commit. Returns how many entities
    /// were flipped; zero unread skips the commit entirely.
    pub async fn mark_all_read(&self) -> Result<usize> {
        let (token, receiver_id, count) = {
            let mut inner = self.inner.lock();
            let ids = inner.collection.mark_all_viewed();
            if ids.is_empty() {
                return Ok(0);
            }
            // The batch commit is scoped to the user, known from `load` or
            // from the entities themselves when events raced the load.
            let receiver_id = inner
                .receiver_id
                .clone()
                .or_else(|| inner.collection.first().map(|n| n.receiver_id.clone()))
                .unwrap_or_default();
            let revision = inner.next_revision();
            let count = ids.len();
            self.finish_mutation(
                &inner,
                StoreEvent::MarkedAllRead { count, unread: 0 },
            );
            (
                OptimisticToken {
                    epoch: inner.epoch,
                    revision,
                    patch: OptimisticPatch::MarkAllRead { ids },
                },
                receiver_id,
                count,
            )
        };

        match self.backend.commit_mark_all_read(&receiver_id).await {
            Ok(()) => {
                self.confirm(token);
                Ok(count)
            }
            Err(err) => Err(self.revert(token, err)),
        }
    }

    /// Optimistically delete one notification, then commit. On commit
    /// failure the entity reappears at its original sorted position.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let token = {
            let mut inner = self.inner.lock();
            let Some(entity) = inner.collection.remove(id) else {
                return Err(Error::not_found(id));
            };
            let revision = inner.next_revision();
            let unread = inner.collection.unread_count();
            self.finish_mutation(
                &inner,
                StoreEvent::Removed {
                    id: id.to_string(),
                    unread,
                },
            );
            OptimisticToken {
                epoch: inner.epoch,
                revision,
                patch: OptimisticPatch::Remove { entity },
            }
        };

        match self.backend.commit_delete(id).await {
            Ok(()) => {
                self.confirm(token);
                Ok(())
            }
            Err(err) => Err(self.revert(token, err)),
        }
    }

    /// Resolve a successful commit. The optimistic value is already in
    /// place (or a remote write replaced it, which is equally final), so
    /// confirmation only retires the token.
    fn confirm(&self, token: OptimisticToken) {
        let inner = self.inner.lock();
        if token.epoch != inner.epoch {
            debug!(op = %token.op(), "commit confirmed after teardown, discarded");
        }
    }

    /// Resolve a failed commit: undo the optimistic patch where remote
    /// state has not superseded it, recount, and re-notify.
    fn revert(&self, token: OptimisticToken, cause: Error) -> Error {
        let op = token.op();
        let error = Error::commit(op, &cause);

        let mut inner = self.inner.lock();
        if token.epoch != inner.epoch {
            debug!(%op, "commit failed after teardown, rollback discarded");
            return error;
        }

        let outcome = {
            let StoreInner {
                collection,
                remote_writes,
                ..
            } = &mut *inner;
            token.revert(collection, remote_writes)
        };
        match outcome {
            RevertOutcome::Reverted(op) => {
                inner.next_revision();
                let unread = inner.collection.unread_count();
                warn!(%op, error = %cause, "commit failed, optimistic change rolled back");
                self.finish_mutation(&inner, StoreEvent::RolledBack { op, unread });
            }
            RevertOutcome::Superseded(op) => {
                debug!(%op, "commit failed but remote state superseded the change");
            }
        }
        error
    }

    /// Publish the derived unread count and the change event while still
    /// holding the state lock, so no later mutation can slip in between
    /// state update and notification.
    fn finish_mutation(&self, inner: &StoreInner, event: StoreEvent) {
        self.unread.publish(inner.collection.unread_count());
        self.events.publish(event);
    }
}
