//! Two-phase optimistic mutations.
//!
//! Each local mutation first applies its patch in memory and takes a token,
//! then commits to the backend and either confirms (drops) or reverts the
//! token. Remote feed events always take precedence over pending optimistic
//! state: a revert no-ops for any entity the feed has written since the
//! token was taken, and a revert after the session epoch has moved on is
//! discarded entirely.

use std::collections::HashMap;

use crate::collection::NotificationCollection;
use crate::error::CommitOp;
use crate::model::Notification;

/// The in-memory patch a token can undo.
#[derive(Debug)]
pub(crate) enum OptimisticPatch {
    /// One entity's viewed flag was flipped to true.
    MarkRead { id: String },
    /// A batch of entities' viewed flags were flipped to true.
    MarkAllRead { ids: Vec<String> },
    /// An entity was removed; kept whole so a revert can re-insert it at
    /// its original sorted position.
    Remove { entity: Notification },
}

/// Handle for a pending optimistic mutation.
#[derive(Debug)]
pub(crate) struct OptimisticToken {
    /// Session epoch at apply time; a mismatch at resolve time means the
    /// store was torn down or reloaded and the token is void.
    pub(crate) epoch: u64,
    /// Store revision at apply time, used to detect remote writes that
    /// landed while the commit was in flight.
    pub(crate) revision: u64,
    pub(crate) patch: OptimisticPatch,
}

/// What a revert actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RevertOutcome {
    /// The patch was undone; the caller must recount and notify.
    Reverted(CommitOp),
    /// Remote state superseded the patch; nothing changed locally.
    Superseded(CommitOp),
}

impl OptimisticToken {
    pub(crate) fn op(&self) -> CommitOp {
        match self.patch {
            OptimisticPatch::MarkRead { .. } => CommitOp::MarkRead,
            OptimisticPatch::MarkAllRead { .. } => CommitOp::MarkAllRead,
            OptimisticPatch::Remove { .. } => CommitOp::Delete,
        }
    }

    /// Undo the patch against the collection, honoring remote precedence.
    ///
    /// `remote_writes` maps entity ids to the store revision of the last
    /// remote write; any id written after this token was taken is left
    /// exactly as the feed put it.
    pub(crate) fn revert(
        self,
        collection: &mut NotificationCollection,
        remote_writes: &HashMap<String, u64>,
    ) -> RevertOutcome {
        let op = self.op();
        let superseded =
            |id: &str| remote_writes.get(id).copied().unwrap_or(0) > self.revision;

        let changed = match self.patch {
            OptimisticPatch::MarkRead { id } => {
                !superseded(&id) && collection.set_viewed(&id, false)
            }
            OptimisticPatch::MarkAllRead { ids } => {
                // The batch reverts as one step; only entities the feed has
                // since rewritten are excluded.
                let mut any = false;
                for id in ids {
                    if !superseded(&id) && collection.set_viewed(&id, false) {
                        any = true;
                    }
                }
                any
            }
            OptimisticPatch::Remove { entity } => {
                if superseded(&entity.id) || collection.contains(&entity.id) {
                    false
                } else {
                    collection.insert_sorted(entity);
                    true
                }
            }
        };

        if changed {
            RevertOutcome::Reverted(op)
        } else {
            RevertOutcome::Superseded(op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn notif(id: &str, secs: i64, viewed: bool) -> Notification {
        let mut n = Notification::new("parent-1", "t", "m")
            .with_created_at(Utc.timestamp_opt(secs, 0).unwrap())
            .with_viewed(viewed);
        n.id = id.to_string();
        n
    }

    fn token(revision: u64, patch: OptimisticPatch) -> OptimisticToken {
        OptimisticToken {
            epoch: 1,
            revision,
            patch,
        }
    }

    #[test]
    fn test_mark_read_revert_restores_flag() {
        let mut c = NotificationCollection::new();
        c.insert_sorted(notif("a", 100, true));

        let outcome = token(1, OptimisticPatch::MarkRead { id: "a".into() })
            .revert(&mut c, &HashMap::new());

        assert_eq!(outcome, RevertOutcome::Reverted(CommitOp::MarkRead));
        assert!(!c.get("a").unwrap().viewed);
    }

    #[test]
    fn test_mark_read_revert_skips_remote_write() {
        let mut c = NotificationCollection::new();
        c.insert_sorted(notif("a", 100, true));
        let remote_writes = HashMap::from([("a".to_string(), 5_u64)]);

        let outcome = token(1, OptimisticPatch::MarkRead { id: "a".into() })
            .revert(&mut c, &remote_writes);

        assert_eq!(outcome, RevertOutcome::Superseded(CommitOp::MarkRead));
        assert!(c.get("a").unwrap().viewed);
    }

    #[test]
    fn test_remove_revert_reinserts_at_sorted_position() {
        let mut c = NotificationCollection::new();
        c.insert_sorted(notif("a", 100, false));
        c.insert_sorted(notif("c", 300, false));
        let removed = notif("b", 200, false);

        let outcome = token(1, OptimisticPatch::Remove { entity: removed })
            .revert(&mut c, &HashMap::new());

        assert_eq!(outcome, RevertOutcome::Reverted(CommitOp::Delete));
        assert_eq!(c.position("b"), Some(1));
    }

    #[test]
    fn test_remove_revert_noop_when_remote_reinserted() {
        let mut c = NotificationCollection::new();
        c.insert_sorted(notif("b", 200, true));
        let stale = notif("b", 200, false);

        let outcome = token(1, OptimisticPatch::Remove { entity: stale })
            .revert(&mut c, &HashMap::new());

        assert_eq!(outcome, RevertOutcome::Superseded(CommitOp::Delete));
        assert!(c.get("b").unwrap().viewed);
    }

    #[test]
    fn test_mark_all_revert_excludes_superseded_ids() {
        let mut c = NotificationCollection::new();
        c.insert_sorted(notif("a", 100, true));
        c.insert_sorted(notif("b", 200, true));
        let remote_writes = HashMap::from([("b".to_string(), 9_u64)]);

        let outcome = token(
            2,
            OptimisticPatch::MarkAllRead {
                ids: vec!["a".into(), "b".into()],
            },
        )
        .revert(&mut c, &remote_writes);

        assert_eq!(outcome, RevertOutcome::Reverted(CommitOp::MarkAllRead));
        assert!(!c.get("a").unwrap().viewed);
        assert!(c.get("b").unwrap().viewed);
    }
}
