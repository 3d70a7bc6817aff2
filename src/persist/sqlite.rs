//! SQLite-backed queue store, append-only transaction log and counter record.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::{
    entry::QueueEntry,
    journal::{StoredTransaction, StoredTransactionEnvelope, TransactionRecord, decode_stored_transaction},
    types::{Availability, LogSeq, TicketStatus, TicketType},
};

use super::{PersistError, PersistResult, Storage};

/// SQLite implementation of [`crate::persist::Storage`].
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates a SQLite database at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite database.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Returns the latest sequence persisted in the transactions table.
    pub fn latest_seq(&self) -> PersistResult<LogSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM transactions", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as LogSeq)
    }

    /// Counts logged records of one type and status without decoding payloads.
    pub fn count_status(&self, ticket_type: TicketType, status: TicketStatus) -> PersistResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE ticket_type = ?1 AND status = ?2",
            params![ticket_type.as_str(), status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl Storage for SqliteStorage {
    fn load_queue(&self) -> PersistResult<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT first_name, last_name, ticket_type, time FROM queue_entries ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let first_name: String = row.get(0)?;
            let last_name: String = row.get(1)?;
            let ticket_type: String = row.get(2)?;
            let time: String = row.get(3)?;
            Ok((first_name, last_name, ticket_type, time))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (first_name, last_name, ticket_type, time) = row?;
            let ticket_type: TicketType = ticket_type
                .parse()
                .map_err(|e| PersistError::Corrupt(format!("queue_entries: {e}")))?;
            out.push(QueueEntry {
                first_name,
                last_name,
                ticket_type,
                registered_at: parse_time(&time)?,
            });
        }
        Ok(out)
    }

    fn save_queue(&mut self, entries: &[QueueEntry]) -> PersistResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM queue_entries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO queue_entries(position, first_name, last_name, ticket_type, time) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, entry) in entries.iter().enumerate() {
                stmt.execute(params![
                    position as i64,
                    entry.first_name,
                    entry.last_name,
                    entry.ticket_type.as_str(),
                    entry.registered_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn append_transaction(&mut self, record: &TransactionRecord) -> PersistResult<LogSeq> {
        let tx = self.conn.transaction()?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM transactions",
            [],
            |row| row.get(0),
        )?;
        let stored = StoredTransaction {
            seq: next as LogSeq,
            record: record.clone(),
        };
        let payload = serde_json::to_vec(&StoredTransactionEnvelope::new(stored))?;
        tx.execute(
            "INSERT INTO transactions(seq, ts_ms, ticket_type, status, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                next,
                record.time.timestamp_millis(),
                record.ticket_type.as_str(),
                record.status.as_str(),
                payload,
            ],
        )?;
        tx.commit()?;
        Ok(next as LogSeq)
    }

    fn load_transactions(&self) -> PersistResult<Vec<StoredTransaction>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, payload FROM transactions ORDER BY seq ASC")?;

        let rows = stmt.query_map([], |row| {
            let seq: i64 = row.get(0)?;
            let payload: Vec<u8> = row.get(1)?;
            let mut stored = decode_stored_transaction(&payload).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    payload.len(),
                    rusqlite::types::Type::Blob,
                    Box::new(std::io::Error::other(err)),
                )
            })?;
            stored.seq = seq as LogSeq;
            Ok(stored)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn load_counter(&self) -> PersistResult<Option<Availability>> {
        let counter = self
            .conn
            .query_row(
                "SELECT vip, regular FROM availability WHERE id = 1",
                [],
                |row| {
                    Ok(Availability {
                        vip: row.get(0)?,
                        regular: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(counter)
    }

    fn save_counter(&mut self, availability: &Availability) -> PersistResult<()> {
        self.conn.execute(
            "INSERT INTO availability(id, vip, regular) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET vip = excluded.vip, regular = excluded.regular",
            params![availability.vip, availability.regular],
        )?;
        Ok(())
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn parse_time(raw: &str) -> PersistResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PersistError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(first: &str, ticket_type: TicketType) -> QueueEntry {
        QueueEntry::new(first, "Doe", ticket_type, Utc::now())
    }

    #[test]
    fn empty_database_reads_as_empty_stores() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(storage.load_queue().unwrap().is_empty());
        assert!(storage.load_transactions().unwrap().is_empty());
        assert_eq!(storage.load_counter().unwrap(), None);
        assert_eq!(storage.latest_seq().unwrap(), 0);
    }

    #[test]
    fn save_queue_replaces_previous_contents() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .save_queue(&[entry("A", TicketType::Vip), entry("B", TicketType::Regular)])
            .unwrap();
        storage.save_queue(&[entry("C", TicketType::Regular)]).unwrap();

        let loaded = storage.load_queue().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].first_name, "C");
    }

    #[test]
    fn append_assigns_monotonic_seq_and_counts_by_status() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let a = entry("A", TicketType::Vip);
        let s1 = storage
            .append_transaction(&TransactionRecord::settle(&a, TicketStatus::Confirmed, Utc::now()))
            .unwrap();
        let s2 = storage
            .append_transaction(&TransactionRecord::settle(&a, TicketStatus::SoldOut, Utc::now()))
            .unwrap();
        assert_eq!((s1, s2), (1, 2));
        assert_eq!(storage.count_status(TicketType::Vip, TicketStatus::Confirmed).unwrap(), 1);
        assert_eq!(storage.count_status(TicketType::Regular, TicketStatus::Confirmed).unwrap(), 0);
    }

    #[test]
    fn counter_upserts_single_row() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.save_counter(&Availability { vip: 3, regular: 5 }).unwrap();
        storage.save_counter(&Availability { vip: 2, regular: 5 }).unwrap();
        assert_eq!(
            storage.load_counter().unwrap(),
            Some(Availability { vip: 2, regular: 5 })
        );
    }
}
