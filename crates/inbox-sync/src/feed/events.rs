//! Feed wire events.

use serde::{Deserialize, Serialize};

use crate::model::Notification;

/// Kind of change carried by a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A single entity-change event from the server-pushed feed.
///
/// Delivery is at-least-once and ordered per entity id only; duplicates and
/// replays are possible on reconnect. The store's idempotency rules are the
/// defense, not the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub entity: Notification,
}

impl ChangeEvent {
    pub fn insert(entity: Notification) -> Self {
        Self {
            op: ChangeOp::Insert,
            entity,
        }
    }

    pub fn update(entity: Notification) -> Self {
        Self {
            op: ChangeOp::Update,
            entity,
        }
    }

    pub fn delete(entity: Notification) -> Self {
        Self {
            op: ChangeOp::Delete,
            entity,
        }
    }
}

/// Signals delivered over a feed subscription.
#[derive(Debug, Clone)]
pub enum FeedSignal {
    /// The transport (re-)established its connection.
    Connected,
    /// An entity change for the subscribed user's notification set.
    Change(ChangeEvent),
    /// The transport lost its connection. A `Connected` may follow if the
    /// provider reconnects on its own.
    Disconnected { reason: String },
}
