//! Notification synchronization engine for the parent dashboard.
//!
//! Owns the canonical notification set for the authenticated user, merges
//! server-pushed change events into it, derives the unread count for every
//! badge surface, and exposes optimistic mutations (mark-read,
//! mark-all-read, delete) that roll back cleanly when their commit fails.
//!
//! The engine is an in-process library: authentication, persistence, and
//! the push transport are collaborators behind the [`backend::InboxBackend`]
//! and [`feed::FeedProvider`] traits.

pub mod ack;
pub mod backend;
pub mod collection;
pub mod config;
pub mod error;
pub mod feed;
pub mod model;
pub mod service;
pub mod store;
pub mod unread;

pub use ack::{AckTimerState, AutoAcknowledgeTimer};
pub use backend::InboxBackend;
pub use config::{FeedConfig, Pagination, SyncConfig};
pub use error::{CommitOp, Error, Result};
pub use feed::{ChangeEvent, ChangeOp, FeedProvider, FeedSignal, FeedSubscription};
pub use model::Notification;
pub use service::NotificationSyncService;
pub use store::{NotificationStore, StoreEvent};
pub use unread::UnreadCountPublisher;
