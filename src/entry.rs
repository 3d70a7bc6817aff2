//! Pending registration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::TicketType;

/// A registration waiting in one of the sub-queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Trimmed first name.
    pub first_name: String,
    /// Trimmed last name.
    pub last_name: String,
    /// Requested ticket class.
    pub ticket_type: TicketType,
    /// Registration time.
    #[serde(rename = "time")]
    pub registered_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Builds a pending entry registered at `registered_at`.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        ticket_type: TicketType,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ticket_type,
            registered_at,
        }
    }

    /// True when this entry belongs to `first_name last_name`.
    pub fn is_named(&self, first_name: &str, last_name: &str) -> bool {
        self.first_name == first_name && self.last_name == last_name
    }

    /// "First Last" display form.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Stored entry.
    pub entry: QueueEntry,
    /// 1-indexed position within the entry's own sub-queue.
    pub position: usize,
    /// Pending entries across both sub-queues, including this one.
    pub queue_length: usize,
}
