//! Runtime event stream payloads.

use crate::types::{Availability, LogSeq, TicketStatus, TicketType};

/// Events emitted from the single-writer desk loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskEvent {
    /// A new entry joined a sub-queue.
    Registered {
        /// Buyer first name.
        first_name: String,
        /// Buyer last name.
        last_name: String,
        /// Ticket class.
        ticket_type: TicketType,
        /// 1-indexed position within the sub-queue.
        position: usize,
    },
    /// A pending entry was settled and logged.
    Processed {
        /// Log sequence of the outcome.
        seq: LogSeq,
        /// Buyer first name.
        first_name: String,
        /// Buyer last name.
        last_name: String,
        /// Ticket class.
        ticket_type: TicketType,
        /// Logged outcome.
        status: TicketStatus,
    },
    /// A pending entry left the queue unprocessed.
    Withdrawn {
        /// Buyer first name.
        first_name: String,
        /// Buyer last name.
        last_name: String,
        /// Ticket class.
        ticket_type: TicketType,
    },
    /// A confirmed ticket was handed back.
    Returned {
        /// Log sequence of the cancellation.
        seq: LogSeq,
        /// Buyer first name.
        first_name: String,
        /// Buyer last name.
        last_name: String,
        /// Ticket class.
        ticket_type: TicketType,
    },
    /// Availability after a state change that touched inventory.
    AvailabilityChanged(Availability),
}
