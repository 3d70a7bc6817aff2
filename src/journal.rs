//! Transaction log records and their versioned on-disk wrapper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entry::QueueEntry,
    types::{LogSeq, TicketStatus, TicketType},
};

/// Version number for serialized [`StoredTransactionEnvelope`] payloads.
pub const LOG_FORMAT_VERSION: u16 = 1;

/// Immutable outcome appended to the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Buyer first name.
    pub first_name: String,
    /// Buyer last name.
    pub last_name: String,
    /// Ticket class.
    pub ticket_type: TicketType,
    /// When the outcome was decided.
    pub time: DateTime<Utc>,
    /// Outcome.
    pub status: TicketStatus,
}

impl TransactionRecord {
    /// Outcome record for a processed queue entry.
    pub fn settle(entry: &QueueEntry, status: TicketStatus, time: DateTime<Utc>) -> Self {
        Self {
            first_name: entry.first_name.clone(),
            last_name: entry.last_name.clone(),
            ticket_type: entry.ticket_type,
            time,
            status,
        }
    }

    /// Cancellation record for a returned ticket.
    pub fn cancellation(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        ticket_type: TicketType,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ticket_type,
            time,
            status: TicketStatus::Cancelled,
        }
    }
}

/// Log row metadata plus record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransaction {
    /// Monotonic log sequence.
    pub seq: LogSeq,
    /// Logged outcome.
    pub record: TransactionRecord,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransactionEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped transaction.
    pub stored: StoredTransaction,
}

impl StoredTransactionEnvelope {
    /// Constructs an envelope using [`LOG_FORMAT_VERSION`].
    pub fn new(stored: StoredTransaction) -> Self {
        Self {
            format_version: LOG_FORMAT_VERSION,
            stored,
        }
    }
}

/// Decodes one stored payload, accepting bare [`StoredTransaction`] rows too.
pub fn decode_stored_transaction(payload: &[u8]) -> Result<StoredTransaction, String> {
    if let Ok(envelope) = serde_json::from_slice::<StoredTransactionEnvelope>(payload) {
        if envelope.format_version != LOG_FORMAT_VERSION {
            return Err(format!(
                "unsupported log format version: {}",
                envelope.format_version
            ));
        }
        return Ok(envelope.stored);
    }

    serde_json::from_slice::<StoredTransaction>(payload)
        .map_err(|e| format!("transaction payload decode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> StoredTransaction {
        StoredTransaction {
            seq: 7,
            record: TransactionRecord {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                ticket_type: TicketType::Vip,
                time: Utc::now(),
                status: TicketStatus::SoldOut,
            },
        }
    }

    #[test]
    fn decodes_envelope_and_bare_payloads() {
        let stored = stored();
        let wrapped = serde_json::to_vec(&StoredTransactionEnvelope::new(stored.clone())).unwrap();
        assert_eq!(decode_stored_transaction(&wrapped).unwrap(), stored);

        let bare = serde_json::to_vec(&stored).unwrap();
        assert_eq!(decode_stored_transaction(&bare).unwrap(), stored);
    }

    #[test]
    fn rejects_unknown_format_version() {
        let mut env = StoredTransactionEnvelope::new(stored());
        env.format_version = 99;
        let payload = serde_json::to_vec(&env).unwrap();
        let err = decode_stored_transaction(&payload).unwrap_err();
        assert!(err.contains("99"));
    }

    #[test]
    fn record_fields_use_log_column_names() {
        let value = serde_json::to_value(&stored().record).unwrap();
        for field in ["first_name", "last_name", "ticket_type", "time", "status"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["status"], "Sold Out");
        assert_eq!(value["ticket_type"], "VIP");
    }
}
