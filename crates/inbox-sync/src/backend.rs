//! External persistence collaborators.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Notification;

/// Server-side persistence for the notification set.
///
/// Every commit operation is idempotent: optimistic retries or duplicate
/// user actions must not corrupt server state.
#[async_trait]
pub trait InboxBackend: Send + Sync {
    /// Fetch the authoritative notification set for a user. Ordering is
    /// irrelevant; the store re-sorts.
    async fn fetch_all(&self, receiver_id: &str) -> Result<Vec<Notification>>;

    /// Persist a single mark-read.
    async fn commit_mark_read(&self, id: &str) -> Result<()>;

    /// Persist a mark-all-read for a user as one all-or-nothing operation.
    async fn commit_mark_all_read(&self, receiver_id: &str) -> Result<()>;

    /// Persist a delete.
    async fn commit_delete(&self, id: &str) -> Result<()>;
}
