//! Notification entity and display ordering.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single institute-originated notification.
///
/// `id` is unique within a store instance and `created_at` never changes
/// after creation; `viewed` is the only field local mutations touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable unique identifier.
    pub id: String,
    /// The dashboard user this notification was sent to.
    pub receiver_id: String,
    pub title: String,
    pub message: String,
    /// Who inside the institute authored the notification.
    pub source_label: String,
    /// Denormalized institute name, read-only on this side.
    pub institute_name: String,
    pub created_at: DateTime<Utc>,
    pub viewed: bool,
}

impl Notification {
    /// Create a new unread notification with a generated id.
    pub fn new(
        receiver_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            receiver_id: receiver_id.into(),
            title: title.into(),
            message: message.into(),
            source_label: "Staff".to_string(),
            institute_name: "Your institute".to_string(),
            created_at: Utc::now(),
            viewed: false,
        }
    }

    /// Set the source label.
    pub fn with_source(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }

    /// Set the institute name.
    pub fn with_institute(mut self, name: impl Into<String>) -> Self {
        self.institute_name = name.into();
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the viewed flag.
    pub fn with_viewed(mut self, viewed: bool) -> Self {
        self.viewed = viewed;
        self
    }
}

/// Display order: newest first, ties broken by `id` for determinism.
pub fn display_cmp(a: &Notification, b: &Notification) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}
