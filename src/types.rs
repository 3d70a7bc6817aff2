//! Shared primitive IDs, ticket enums and inventory counters.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Monotonic transaction-log sequence number.
pub type LogSeq = u64;

/// Ticket class a user registers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TicketType {
    /// Priority class; its sub-queue is always drained first.
    #[serde(rename = "VIP")]
    Vip,
    /// Standard class.
    Regular,
}

impl TicketType {
    /// Both ticket types in processing priority order.
    pub const ALL: [TicketType; 2] = [TicketType::Vip, TicketType::Regular];

    /// Canonical display label, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vip => "VIP",
            Self::Regular => "Regular",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected ticket type label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ticket type {0:?}: must be 'VIP' or 'Regular'")]
pub struct ParseTicketTypeError(pub String);

impl FromStr for TicketType {
    type Err = ParseTicketTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vip" => Ok(Self::Vip),
            "regular" => Ok(Self::Regular),
            _ => Err(ParseTicketTypeError(s.to_string())),
        }
    }
}

/// Terminal outcome recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Inventory was available at processing time.
    Confirmed,
    /// Inventory was exhausted at processing time.
    #[serde(rename = "Sold Out")]
    SoldOut,
    /// A confirmed ticket was handed back.
    Cancelled,
}

impl TicketStatus {
    /// Persisted label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::SoldOut => "Sold Out",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "sold out" => Ok(Self::SoldOut),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

/// Remaining tickets per type. Persisted as the `{VIP, Regular}` counter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Availability {
    /// Remaining VIP tickets.
    #[serde(rename = "VIP")]
    pub vip: u32,
    /// Remaining Regular tickets.
    #[serde(rename = "Regular")]
    pub regular: u32,
}

impl Availability {
    /// Remaining count for `ticket_type`.
    pub fn get(&self, ticket_type: TicketType) -> u32 {
        match ticket_type {
            TicketType::Vip => self.vip,
            TicketType::Regular => self.regular,
        }
    }

    fn slot(&mut self, ticket_type: TicketType) -> &mut u32 {
        match ticket_type {
            TicketType::Vip => &mut self.vip,
            TicketType::Regular => &mut self.regular,
        }
    }

    /// Takes one unit, never going below zero.
    pub fn decrement(&mut self, ticket_type: TicketType) {
        let slot = self.slot(ticket_type);
        *slot = slot.saturating_sub(1);
    }

    /// Returns one unit.
    pub fn increment(&mut self, ticket_type: TicketType) {
        let slot = self.slot(ticket_type);
        *slot = slot.saturating_add(1);
    }
}

/// Fixed starting inventory for each ticket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    /// Initial VIP tickets.
    pub vip: u32,
    /// Initial Regular tickets.
    pub regular: u32,
}

impl Default for Inventory {
    fn default() -> Self {
        Self { vip: 3, regular: 5 }
    }
}

impl Inventory {
    /// Creates an inventory with the given starting counts.
    pub fn new(vip: u32, regular: u32) -> Self {
        Self { vip, regular }
    }

    /// Initial count for `ticket_type`.
    pub fn total(&self, ticket_type: TicketType) -> u32 {
        match ticket_type {
            TicketType::Vip => self.vip,
            TicketType::Regular => self.regular,
        }
    }

    /// Availability before anything has been sold.
    pub fn full(&self) -> Availability {
        Availability {
            vip: self.vip,
            regular: self.regular,
        }
    }
}

/// Pending entries per sub-queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Pending VIP entries.
    #[serde(rename = "VIP_queue")]
    pub vip_queue: usize,
    /// Pending Regular entries.
    #[serde(rename = "Regular_queue")]
    pub regular_queue: usize,
}

/// Sold/remaining/total for one ticket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    /// Tickets out.
    pub sold: u32,
    /// Tickets left.
    pub remaining: u32,
    /// Starting inventory.
    pub total: u32,
}

/// Sales overview across both ticket types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    /// VIP figures.
    #[serde(rename = "VIP")]
    pub vip: TypeSummary,
    /// Regular figures.
    #[serde(rename = "Regular")]
    pub regular: TypeSummary,
    /// Sold across both types.
    pub total_sold: u32,
    /// Remaining across both types.
    pub total_remaining: u32,
}

impl SalesSummary {
    /// Builds the summary from starting inventory and current availability.
    pub fn from_counts(inventory: &Inventory, availability: &Availability) -> Self {
        let per_type = |ticket_type| {
            let total = inventory.total(ticket_type);
            let remaining = availability.get(ticket_type).min(total);
            TypeSummary {
                sold: total - remaining,
                remaining,
                total,
            }
        };
        let vip = per_type(TicketType::Vip);
        let regular = per_type(TicketType::Regular);
        Self {
            vip,
            regular,
            total_sold: vip.sold + regular.sold,
            total_remaining: vip.remaining + regular.remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_type_parse_is_case_insensitive() {
        assert_eq!("vip".parse::<TicketType>(), Ok(TicketType::Vip));
        assert_eq!(" VIP ".parse::<TicketType>(), Ok(TicketType::Vip));
        assert_eq!("REGULAR".parse::<TicketType>(), Ok(TicketType::Regular));
        assert!("balcony".parse::<TicketType>().is_err());
        assert!("".parse::<TicketType>().is_err());
    }

    #[test]
    fn availability_never_goes_negative() {
        let mut a = Availability { vip: 1, regular: 0 };
        a.decrement(TicketType::Vip);
        a.decrement(TicketType::Vip);
        a.decrement(TicketType::Regular);
        assert_eq!(a, Availability { vip: 0, regular: 0 });
    }

    #[test]
    fn serialized_labels_match_persisted_format() {
        let json = serde_json::to_string(&Availability { vip: 2, regular: 4 }).unwrap();
        assert_eq!(json, r#"{"VIP":2,"Regular":4}"#);
        assert_eq!(
            serde_json::to_string(&TicketStatus::SoldOut).unwrap(),
            r#""Sold Out""#
        );
    }

    #[test]
    fn summary_counts_sold_against_inventory() {
        let summary = SalesSummary::from_counts(
            &Inventory::new(3, 5),
            &Availability { vip: 1, regular: 5 },
        );
        assert_eq!(summary.vip.sold, 2);
        assert_eq!(summary.regular.sold, 0);
        assert_eq!(summary.total_sold, 2);
        assert_eq!(summary.total_remaining, 6);
    }
}
