//! In-process storage for tests, benchmarks and throwaway desks.

use crate::{
    entry::QueueEntry,
    journal::{StoredTransaction, TransactionRecord},
    types::{Availability, LogSeq},
};

use super::{PersistResult, Storage};

/// Keeps all three stores in memory; nothing survives a drop.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    queue: Vec<QueueEntry>,
    log: Vec<StoredTransaction>,
    counter: Option<Availability>,
}

impl MemoryStorage {
    /// Empty stores.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load_queue(&self) -> PersistResult<Vec<QueueEntry>> {
        Ok(self.queue.clone())
    }

    fn save_queue(&mut self, entries: &[QueueEntry]) -> PersistResult<()> {
        self.queue = entries.to_vec();
        Ok(())
    }

    fn append_transaction(&mut self, record: &TransactionRecord) -> PersistResult<LogSeq> {
        let seq = self.log.last().map(|s| s.seq + 1).unwrap_or(1);
        self.log.push(StoredTransaction {
            seq,
            record: record.clone(),
        });
        Ok(seq)
    }

    fn load_transactions(&self) -> PersistResult<Vec<StoredTransaction>> {
        Ok(self.log.clone())
    }

    fn load_counter(&self) -> PersistResult<Option<Availability>> {
        Ok(self.counter)
    }

    fn save_counter(&mut self, availability: &Availability) -> PersistResult<()> {
        self.counter = Some(*availability);
        Ok(())
    }
}
