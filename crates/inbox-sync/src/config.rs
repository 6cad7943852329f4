//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the notification synchronization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Dwell period before visible unread notifications are auto-acknowledged.
    pub auto_ack_dwell: Duration,
    /// List paging tunables for display surfaces.
    pub pagination: Pagination,
    /// Feed channel behavior.
    pub feed: FeedConfig,
    /// Capacity of the store event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_ack_dwell: Duration::from_secs(5),
            pagination: Pagination::default(),
            feed: FeedConfig::default(),
            event_capacity: 256,
        }
    }
}

/// Paging tunables. The store holds no cursor state; the display limit
/// belongs to the view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of notifications shown when the list first renders.
    pub initial_limit: usize,
    /// How many more are revealed per "load more" action.
    pub increment: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            initial_limit: 6,
            increment: 4,
        }
    }
}

/// Configuration for the feed channel runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Re-run the initial fetch after a reconnect to close the
    /// event-loss window.
    pub resync_on_reconnect: bool,
    /// Maximum re-subscribe attempts after the transport drops.
    pub max_reconnect_attempts: u32,
    /// Initial re-subscribe delay in milliseconds.
    pub initial_reconnect_delay_ms: u64,
    /// Maximum re-subscribe delay in milliseconds.
    pub max_reconnect_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            resync_on_reconnect: true,
            max_reconnect_attempts: 10,
            initial_reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 60000,
        }
    }
}
