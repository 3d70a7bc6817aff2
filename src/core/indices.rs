use hashbrown::HashMap;

use crate::{
    journal::TransactionRecord,
    types::{TicketStatus, TicketType},
};

/// Name-based ticket holder key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HolderKey {
    /// Holder first name.
    pub first_name: String,
    /// Holder last name.
    pub last_name: String,
    /// Ticket class held.
    pub ticket_type: TicketType,
}

impl HolderKey {
    /// Builds a key from borrowed names.
    pub fn new(first_name: &str, last_name: &str, ticket_type: TicketType) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            ticket_type,
        }
    }
}

/// Confirmed tickets still held per holder, net of cancellations.
#[derive(Debug, Default, Clone)]
pub struct Holdings {
    held: HashMap<HolderKey, u32>,
}

impl Holdings {
    /// Folds the log: `Confirmed` adds a ticket, `Cancelled` takes one away.
    pub fn from_log<'a>(records: impl IntoIterator<Item = &'a TransactionRecord>) -> Self {
        let mut held: HashMap<HolderKey, u32> = HashMap::new();
        for record in records {
            let key = HolderKey::new(&record.first_name, &record.last_name, record.ticket_type);
            match record.status {
                TicketStatus::Confirmed => *held.entry(key).or_insert(0) += 1,
                TicketStatus::Cancelled => {
                    if let Some(count) = held.get_mut(&key) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            held.remove(&key);
                        }
                    }
                }
                TicketStatus::SoldOut => {}
            }
        }
        Self { held }
    }

    /// Tickets currently held under `key`.
    pub fn held(&self, key: &HolderKey) -> u32 {
        self.held.get(key).copied().unwrap_or(0)
    }

    /// Number of holders with at least one ticket.
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// True when nobody holds a ticket.
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}
