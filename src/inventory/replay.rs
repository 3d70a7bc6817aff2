//! Availability as a pure function of the transaction log.

use hashbrown::HashMap;

use crate::{
    journal::TransactionRecord,
    types::{Availability, Inventory, TicketStatus, TicketType},
};

/// Replays `records` against `initial`.
///
/// A confirmation consumes one unit and a cancellation hands one back. Net
/// consumption is floored at zero per type, and remaining counts are clamped
/// to `[0, initial]`, so an over-subscribed log reads as sold out rather than
/// negative.
pub fn replay<'a>(
    initial: &Inventory,
    records: impl IntoIterator<Item = &'a TransactionRecord>,
) -> Availability {
    let consumed = net_consumed(records);
    let remaining = |ticket_type| {
        let used = consumed.get(&ticket_type).copied().unwrap_or(0);
        initial.total(ticket_type).saturating_sub(used)
    };
    Availability {
        vip: remaining(TicketType::Vip),
        regular: remaining(TicketType::Regular),
    }
}

/// Units consumed per type, net of cancellations and floored at zero.
///
/// Unlike the remaining count this is not capped by inventory, so a log
/// written against a larger inventory shows how far it is oversubscribed.
pub fn net_consumed<'a>(
    records: impl IntoIterator<Item = &'a TransactionRecord>,
) -> HashMap<TicketType, u32> {
    let mut consumed: HashMap<TicketType, u32> = HashMap::new();
    for record in records {
        let slot = consumed.entry(record.ticket_type).or_insert(0);
        match record.status {
            TicketStatus::Confirmed => *slot = slot.saturating_add(1),
            TicketStatus::Cancelled => *slot = slot.saturating_sub(1),
            TicketStatus::SoldOut => {}
        }
    }
    consumed
}
