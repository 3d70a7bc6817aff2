use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    core::{
        indices::{HolderKey, Holdings},
        queue::{QueueView, WaitingList},
    },
    entry::{QueueEntry, Registration},
    inventory::{AvailabilityMode, Calculator},
    journal::{StoredTransaction, TransactionRecord},
    persist::{PersistError, Storage},
    types::{
        Availability, Inventory, LogSeq, ParseTicketTypeError, QueueStatus, SalesSummary,
        TicketStatus, TicketType,
    },
};

/// Failure of a queue operation.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Empty name or unrecognized ticket type.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// No matching pending entry or held ticket.
    #[error("{first_name} {last_name} not found")]
    NotFound {
        /// Requested first name.
        first_name: String,
        /// Requested last name.
        last_name: String,
    },
    /// A return would not free a unit of this type.
    #[error("no {0} tickets are out to return")]
    NothingToReturn(TicketType),
    /// Storage failure.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<ParseTicketTypeError> for QueueError {
    fn from(value: ParseTicketTypeError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

/// One settled entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processed {
    /// Log sequence of the outcome record.
    pub seq: LogSeq,
    /// The appended record.
    pub record: TransactionRecord,
    /// Availability right after this entry was settled.
    pub availability: Availability,
}

impl Processed {
    /// Outcome recorded for the entry.
    pub fn status(&self) -> TicketStatus {
        self.record.status
    }
}

/// Outcome of [`QueueManager::process_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Settled entries, VIP sub-queue first.
    pub processed: Vec<Processed>,
    /// Availability after the last entry.
    pub availability: Availability,
}

/// Outcome of [`QueueManager::cancel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// A pending entry left the queue before processing. Nothing was logged.
    Withdrawn {
        /// The removed entry.
        entry: QueueEntry,
    },
    /// A confirmed ticket went back into inventory.
    Returned {
        /// Log sequence of the cancellation.
        seq: LogSeq,
        /// The appended `Cancelled` record.
        record: TransactionRecord,
        /// Availability after the return.
        availability: Availability,
    },
}

/// Queue and inventory state machine over a [`Storage`] backend.
///
/// Every operation reads the stores it needs, decides, and writes the
/// results back before returning. Nothing is cached between calls, so two
/// managers over the same files see each other's writes but are not
/// serialized against each other; share one instance through
/// [`crate::runtime::handle::spawn_ticket_desk`] instead.
pub struct QueueManager<S: Storage> {
    storage: S,
    calculator: Calculator,
}

impl<S: Storage> QueueManager<S> {
    /// Creates a manager over `storage` using `mode` against `inventory`.
    pub fn new(storage: S, inventory: Inventory, mode: AvailabilityMode) -> Self {
        Self {
            storage,
            calculator: Calculator::new(mode, inventory),
        }
    }

    /// Starting inventory.
    pub fn inventory(&self) -> &Inventory {
        self.calculator.initial()
    }

    /// Active availability strategy.
    pub fn mode(&self) -> AvailabilityMode {
        self.calculator.mode()
    }

    /// Backing storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutable access to the backing storage.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Adds a pending entry to the back of its sub-queue.
    ///
    /// `ticket_type` is matched case-insensitively; names are trimmed and
    /// must not be empty.
    pub fn register(
        &mut self,
        first_name: &str,
        last_name: &str,
        ticket_type: &str,
    ) -> Result<Registration, QueueError> {
        let ticket_type: TicketType = ticket_type.parse()?;
        let (first_name, last_name) = validate_names(first_name, last_name)?;

        let mut queue = self.load_waiting()?;
        let entry = QueueEntry::new(first_name, last_name, ticket_type, now());
        let position = queue.push(entry.clone());
        self.storage.save_queue(queue.entries())?;

        info!(
            first_name = %entry.first_name,
            last_name = %entry.last_name,
            ticket_type = %ticket_type,
            position,
            "registered"
        );
        Ok(Registration {
            entry,
            position,
            queue_length: queue.len(),
        })
    }

    /// Settles the head of the VIP sub-queue, or of Regular if VIP is empty.
    ///
    /// Returns `Ok(None)` when nobody is waiting.
    pub fn process_next(&mut self) -> Result<Option<Processed>, QueueError> {
        let mut queue = self.load_waiting()?;
        let Some(entry) = queue.next_index().and_then(|idx| queue.remove(idx)) else {
            debug!("no one waiting");
            return Ok(None);
        };

        let available = self.calculator.availability(&mut self.storage)?;
        let processed = self.settle(&entry, available)?;
        self.storage.save_queue(queue.entries())?;
        Ok(Some(processed))
    }

    /// Settles one named entry, searching VIP before Regular.
    pub fn process_one(&mut self, first_name: &str, last_name: &str) -> Result<Processed, QueueError> {
        let (first_name, last_name) = (first_name.trim(), last_name.trim());
        let mut queue = self.load_waiting()?;
        let entry = queue
            .find(first_name, last_name)
            .and_then(|idx| queue.remove(idx))
            .ok_or_else(|| not_found(first_name, last_name))?;

        let available = self.calculator.availability(&mut self.storage)?;
        let processed = self.settle(&entry, available)?;
        self.storage.save_queue(queue.entries())?;
        Ok(processed)
    }

    /// Settles every pending entry, the whole VIP sub-queue before Regular.
    ///
    /// The queue store is rewritten after each entry, so an interrupted batch
    /// leaves only unsettled entries behind.
    pub fn process_all(&mut self) -> Result<BatchOutcome, QueueError> {
        let mut queue = self.load_waiting()?;
        let mut available = self.calculator.availability(&mut self.storage)?;
        let mut processed = Vec::with_capacity(queue.len());

        for ticket_type in TicketType::ALL {
            while let Some(entry) = queue.head_index(ticket_type).and_then(|idx| queue.remove(idx)) {
                let outcome = self.settle(&entry, available)?;
                self.storage.save_queue(queue.entries())?;
                available = outcome.availability;
                processed.push(outcome);
            }
        }

        info!(
            settled = processed.len(),
            vip_remaining = available.vip,
            regular_remaining = available.regular,
            "processed queue"
        );
        Ok(BatchOutcome {
            processed,
            availability: available,
        })
    }

    /// Cancels for `first_name last_name` in the `ticket_type` class.
    ///
    /// A still-pending entry is simply withdrawn. Otherwise the name must
    /// hold a confirmed ticket of that type, which is returned to inventory
    /// and logged as `Cancelled`.
    pub fn cancel(
        &mut self,
        first_name: &str,
        last_name: &str,
        ticket_type: &str,
    ) -> Result<CancelOutcome, QueueError> {
        let ticket_type: TicketType = ticket_type.parse()?;
        let (first_name, last_name) = validate_names(first_name, last_name)?;

        let mut queue = self.load_waiting()?;
        if let Some(entry) = queue
            .find_in(ticket_type, first_name, last_name)
            .and_then(|idx| queue.remove(idx))
        {
            self.storage.save_queue(queue.entries())?;
            info!(%first_name, %last_name, %ticket_type, "withdrawn from queue");
            return Ok(CancelOutcome::Withdrawn { entry });
        }

        let log = self.storage.load_transactions()?;
        let holdings = Holdings::from_log(log.iter().map(|s| &s.record));
        if holdings.held(&HolderKey::new(first_name, last_name, ticket_type)) == 0 {
            return Err(not_found(first_name, last_name));
        }

        let before = self.calculator.availability(&mut self.storage)?;
        if !self
            .calculator
            .can_release(&mut self.storage, before, ticket_type)?
        {
            warn!(
                %ticket_type,
                remaining = before.get(ticket_type),
                initial = self.inventory().total(ticket_type),
                "return would not free a ticket; log and inventory disagree"
            );
            return Err(QueueError::NothingToReturn(ticket_type));
        }

        let record = TransactionRecord::cancellation(first_name, last_name, ticket_type, now());
        let seq = self.storage.append_transaction(&record)?;
        let availability = self
            .calculator
            .release(&mut self.storage, ticket_type)?;

        info!(
            seq,
            %first_name,
            %last_name,
            %ticket_type,
            remaining = availability.get(ticket_type),
            "ticket returned"
        );
        Ok(CancelOutcome::Returned {
            seq,
            record,
            availability,
        })
    }

    /// Remaining tickets per type under the active strategy.
    pub fn availability(&mut self) -> Result<Availability, QueueError> {
        Ok(self.calculator.availability(&mut self.storage)?)
    }

    /// Pending entries per sub-queue.
    pub fn queue_status(&self) -> Result<QueueStatus, QueueError> {
        Ok(self.load_waiting()?.status())
    }

    /// 1-indexed position of a pending entry within its sub-queue.
    pub fn position(
        &self,
        first_name: &str,
        last_name: &str,
        ticket_type: &str,
    ) -> Result<Option<usize>, QueueError> {
        let ticket_type: TicketType = ticket_type.parse()?;
        Ok(self
            .load_waiting()?
            .position(ticket_type, first_name.trim(), last_name.trim()))
    }

    /// Both sub-queues, heads first.
    pub fn waiting(&self) -> Result<QueueView, QueueError> {
        Ok(self.load_waiting()?.view())
    }

    /// Sold and remaining tickets per type.
    pub fn summary(&mut self) -> Result<SalesSummary, QueueError> {
        let availability = self.availability()?;
        Ok(SalesSummary::from_counts(self.inventory(), &availability))
    }

    /// The whole log in sequence order.
    pub fn transactions(&self) -> Result<Vec<StoredTransaction>, QueueError> {
        Ok(self.storage.load_transactions()?)
    }

    fn load_waiting(&self) -> Result<WaitingList, QueueError> {
        Ok(WaitingList::from_entries(self.storage.load_queue()?))
    }

    fn settle(&mut self, entry: &QueueEntry, available: Availability) -> Result<Processed, QueueError> {
        let ticket_type = entry.ticket_type;
        let status = if available.get(ticket_type) > 0 {
            TicketStatus::Confirmed
        } else {
            TicketStatus::SoldOut
        };

        let record = TransactionRecord::settle(entry, status, now());
        let seq = self.storage.append_transaction(&record)?;
        let availability = match status {
            TicketStatus::Confirmed => self.calculator.consume(&mut self.storage, available, ticket_type)?,
            _ => available,
        };

        info!(
            seq,
            first_name = %entry.first_name,
            last_name = %entry.last_name,
            %ticket_type,
            %status,
            remaining = availability.get(ticket_type),
            "processed"
        );
        Ok(Processed {
            seq,
            record,
            availability,
        })
    }
}

fn validate_names<'a>(first_name: &'a str, last_name: &'a str) -> Result<(&'a str, &'a str), QueueError> {
    let (first_name, last_name) = (first_name.trim(), last_name.trim());
    if first_name.is_empty() || last_name.is_empty() {
        return Err(QueueError::InvalidInput(
            "first name and last name are required".to_string(),
        ));
    }
    Ok((first_name, last_name))
}

fn not_found(first_name: &str, last_name: &str) -> QueueError {
    QueueError::NotFound {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::memory::MemoryStorage;

    fn manager(vip: u32, regular: u32) -> QueueManager<MemoryStorage> {
        QueueManager::new(MemoryStorage::new(), Inventory::new(vip, regular), AvailabilityMode::Replay)
    }

    #[test]
    fn register_rejects_bad_input() {
        let mut m = manager(1, 1);
        assert!(matches!(m.register("", "Doe", "VIP"), Err(QueueError::InvalidInput(_))));
        assert!(matches!(m.register("Jo", "  ", "VIP"), Err(QueueError::InvalidInput(_))));
        assert!(matches!(m.register("Jo", "Doe", "balcony"), Err(QueueError::InvalidInput(_))));
        assert_eq!(m.queue_status().unwrap(), QueueStatus::default());
    }

    #[test]
    fn register_normalizes_type_and_trims_names() {
        let mut m = manager(1, 1);
        let reg = m.register("  Jo ", " Doe", "vIp").unwrap();
        assert_eq!(reg.entry.first_name, "Jo");
        assert_eq!(reg.entry.last_name, "Doe");
        assert_eq!(reg.entry.ticket_type, TicketType::Vip);
        assert_eq!((reg.position, reg.queue_length), (1, 1));
    }

    #[test]
    fn process_next_on_empty_queue_is_a_no_op() {
        let mut m = manager(1, 1);
        assert_eq!(m.process_next().unwrap(), None);
        assert!(m.transactions().unwrap().is_empty());
    }

    #[test]
    fn process_one_missing_is_not_found() {
        let mut m = manager(1, 1);
        m.register("A", "One", "VIP").unwrap();
        assert!(matches!(m.process_one("B", "Two"), Err(QueueError::NotFound { .. })));
        assert_eq!(m.queue_status().unwrap().vip_queue, 1);
    }

    #[test]
    fn process_one_removes_only_the_matched_entry() {
        let mut m = manager(1, 1);
        m.register("A", "One", "Regular").unwrap();
        m.register("A", "One", "VIP").unwrap();
        let processed = m.process_one("A", "One").unwrap();
        assert_eq!(processed.record.ticket_type, TicketType::Vip);
        assert_eq!(
            m.queue_status().unwrap(),
            QueueStatus { vip_queue: 0, regular_queue: 1 }
        );
    }

    #[test]
    fn cancel_unknown_name_is_not_found() {
        let mut m = manager(1, 1);
        assert!(matches!(m.cancel("Z", "Z", "VIP"), Err(QueueError::NotFound { .. })));
    }
}
