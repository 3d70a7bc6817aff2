//! Storage abstraction for the queue store, transaction log and counter record.

/// Line-per-record flat-file backend.
pub mod jsonl;
/// Ephemeral in-process backend.
pub mod memory;
/// SQLite backend.
pub mod sqlite;

use crate::{
    entry::QueueEntry,
    journal::{StoredTransaction, TransactionRecord},
    types::{Availability, LogSeq},
};

/// Failure reading or writing one of the backing stores.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// SQLite backend error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Record encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Filesystem error on a flat file.
    #[error("{path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Stored data could not be interpreted.
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl PersistError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result alias for storage operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Backing stores behind a [`crate::core::manager::QueueManager`].
///
/// Reads of a store that has never been written return the empty value
/// (`[]` for the queue and log, `None` for the counter).
pub trait Storage: Send {
    /// Loads all pending entries in arrival order.
    fn load_queue(&self) -> PersistResult<Vec<QueueEntry>>;
    /// Replaces the whole queue store with `entries`.
    fn save_queue(&mut self, entries: &[QueueEntry]) -> PersistResult<()>;
    /// Appends one record and returns the sequence it was stored under.
    fn append_transaction(&mut self, record: &TransactionRecord) -> PersistResult<LogSeq>;
    /// Loads the full log in sequence order.
    fn load_transactions(&self) -> PersistResult<Vec<StoredTransaction>>;
    /// Reads the persisted availability counter, if one was ever written.
    fn load_counter(&self) -> PersistResult<Option<Availability>>;
    /// Overwrites the persisted availability counter.
    fn save_counter(&mut self, availability: &Availability) -> PersistResult<()>;
    /// Makes completed writes durable.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn load_queue(&self) -> PersistResult<Vec<QueueEntry>> {
        (**self).load_queue()
    }

    fn save_queue(&mut self, entries: &[QueueEntry]) -> PersistResult<()> {
        (**self).save_queue(entries)
    }

    fn append_transaction(&mut self, record: &TransactionRecord) -> PersistResult<LogSeq> {
        (**self).append_transaction(record)
    }

    fn load_transactions(&self) -> PersistResult<Vec<StoredTransaction>> {
        (**self).load_transactions()
    }

    fn load_counter(&self) -> PersistResult<Option<Availability>> {
        (**self).load_counter()
    }

    fn save_counter(&mut self, availability: &Availability) -> PersistResult<()> {
        (**self).save_counter(availability)
    }

    fn flush(&mut self) -> PersistResult<()> {
        (**self).flush()
    }
}
