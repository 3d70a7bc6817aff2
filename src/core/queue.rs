//! The waiting list: one arrival-ordered sequence viewed as two FIFO sub-queues.

use serde::{Deserialize, Serialize};

use crate::{
    entry::QueueEntry,
    types::{QueueStatus, TicketType},
};

/// Pending entries in arrival order.
///
/// Sub-queue order is arrival order restricted to one ticket type, so the
/// persisted snapshot never needs to be split or re-merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitingList {
    entries: Vec<QueueEntry>,
}

/// Both sub-queues, heads first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueView {
    /// Pending VIP entries.
    #[serde(rename = "VIP Queue")]
    pub vip: Vec<QueueEntry>,
    /// Pending Regular entries.
    #[serde(rename = "Regular Queue")]
    pub regular: Vec<QueueEntry>,
}

impl WaitingList {
    /// Wraps entries already in arrival order.
    pub fn from_entries(entries: Vec<QueueEntry>) -> Self {
        Self { entries }
    }

    /// All entries in arrival order.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Pending entries across both sub-queues.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends `entry` and returns its 1-indexed position in its sub-queue.
    pub fn push(&mut self, entry: QueueEntry) -> usize {
        let ticket_type = entry.ticket_type;
        self.entries.push(entry);
        self.count(ticket_type)
    }

    /// Pending entries of `ticket_type`.
    pub fn count(&self, ticket_type: TicketType) -> usize {
        self.sub_queue(ticket_type).count()
    }

    /// Counts for both sub-queues.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            vip_queue: self.count(TicketType::Vip),
            regular_queue: self.count(TicketType::Regular),
        }
    }

    /// Entries of `ticket_type`, head first.
    pub fn sub_queue(&self, ticket_type: TicketType) -> impl Iterator<Item = &QueueEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.ticket_type == ticket_type)
    }

    /// Owned copy of both sub-queues.
    pub fn view(&self) -> QueueView {
        QueueView {
            vip: self.sub_queue(TicketType::Vip).cloned().collect(),
            regular: self.sub_queue(TicketType::Regular).cloned().collect(),
        }
    }

    /// Index of the head of the highest-priority non-empty sub-queue.
    pub fn next_index(&self) -> Option<usize> {
        TicketType::ALL
            .into_iter()
            .find_map(|ticket_type| self.head_index(ticket_type))
    }

    /// Index of the head of `ticket_type`'s sub-queue.
    pub fn head_index(&self, ticket_type: TicketType) -> Option<usize> {
        self.entries.iter().position(|e| e.ticket_type == ticket_type)
    }

    /// Index of the first entry named `first_name last_name` within `ticket_type`.
    pub fn find_in(&self, ticket_type: TicketType, first_name: &str, last_name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.ticket_type == ticket_type && e.is_named(first_name, last_name))
    }

    /// Like [`Self::find_in`], searching the VIP sub-queue before Regular.
    pub fn find(&self, first_name: &str, last_name: &str) -> Option<usize> {
        TicketType::ALL
            .into_iter()
            .find_map(|ticket_type| self.find_in(ticket_type, first_name, last_name))
    }

    /// 1-indexed position of a named entry within its sub-queue.
    pub fn position(&self, ticket_type: TicketType, first_name: &str, last_name: &str) -> Option<usize> {
        self.sub_queue(ticket_type)
            .position(|e| e.is_named(first_name, last_name))
            .map(|idx| idx + 1)
    }

    /// Removes the entry at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<QueueEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }
}
