//! Queue state and the processing state machine.

/// Ticket holder index rebuilt from the log.
pub mod indices;
/// Registration, processing and cancellation over a storage backend.
pub mod manager;
/// Arrival-ordered waiting list with VIP/Regular sub-queue views.
pub mod queue;
