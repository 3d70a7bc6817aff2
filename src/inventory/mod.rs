//! Remaining-ticket calculation.
//!
//! Two strategies exist and a desk uses exactly one of them for its whole
//! lifetime. Replay mode treats the transaction log as the only source of
//! truth. Counter mode keeps a separate `{VIP, Regular}` record that is
//! adjusted next to every log append; it is cheaper to read but can drift
//! from the log if a write is interrupted between the two.

/// Persisted counter strategy.
pub mod counter;
/// Log replay strategy.
pub mod replay;

use serde::{Deserialize, Serialize};

use crate::{
    persist::{PersistResult, Storage},
    types::{Availability, Inventory, TicketType},
};

/// Which strategy derives availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityMode {
    /// Initial inventory minus net confirmations in the log.
    #[default]
    Replay,
    /// Persisted counter record.
    Counter,
}

impl std::str::FromStr for AvailabilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replay" => Ok(Self::Replay),
            "counter" => Ok(Self::Counter),
            other => Err(format!("unknown availability mode: {other}")),
        }
    }
}

/// Availability calculator bound to one starting inventory and one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calculator {
    mode: AvailabilityMode,
    initial: Inventory,
}

impl Calculator {
    /// Binds `mode` to a starting inventory.
    pub fn new(mode: AvailabilityMode, initial: Inventory) -> Self {
        Self { mode, initial }
    }

    /// Active strategy.
    pub fn mode(&self) -> AvailabilityMode {
        self.mode
    }

    /// Starting inventory.
    pub fn initial(&self) -> &Inventory {
        &self.initial
    }

    /// Current availability.
    ///
    /// In counter mode the first call persists the starting inventory.
    pub fn availability<S: Storage + ?Sized>(&self, storage: &mut S) -> PersistResult<Availability> {
        match self.mode {
            AvailabilityMode::Replay => {
                let log = storage.load_transactions()?;
                Ok(replay::replay(&self.initial, log.iter().map(|s| &s.record)))
            }
            AvailabilityMode::Counter => counter::read(storage, &self.initial),
        }
    }

    /// Records that one unit of `ticket_type` was confirmed.
    ///
    /// `before` is the availability the confirmation was decided against. In
    /// replay mode the matching log record already carries the consumption,
    /// so only the in-memory view is advanced.
    pub fn consume<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        before: Availability,
        ticket_type: TicketType,
    ) -> PersistResult<Availability> {
        match self.mode {
            AvailabilityMode::Replay => {
                let mut after = before;
                after.decrement(ticket_type);
                Ok(after)
            }
            AvailabilityMode::Counter => counter::decrement(storage, &self.initial, ticket_type),
        }
    }

    /// True when handing back one unit of `ticket_type` would raise
    /// availability by exactly one.
    ///
    /// In replay mode the log can hold more net confirmations than the
    /// current inventory (for example after the inventory was lowered), and a
    /// return then only cancels an oversubscribed unit.
    pub fn can_release<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        before: Availability,
        ticket_type: TicketType,
    ) -> PersistResult<bool> {
        let total = self.initial.total(ticket_type);
        if before.get(ticket_type) >= total {
            return Ok(false);
        }
        match self.mode {
            AvailabilityMode::Replay => {
                let log = storage.load_transactions()?;
                let consumed = replay::net_consumed(log.iter().map(|s| &s.record))
                    .get(&ticket_type)
                    .copied()
                    .unwrap_or(0);
                Ok(consumed <= total)
            }
            AvailabilityMode::Counter => Ok(true),
        }
    }

    /// Records that one confirmed unit of `ticket_type` was handed back.
    ///
    /// In replay mode the matching `Cancelled` record must already be in the
    /// log; the result is read back from it.
    pub fn release<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        ticket_type: TicketType,
    ) -> PersistResult<Availability> {
        match self.mode {
            AvailabilityMode::Replay => self.availability(storage),
            AvailabilityMode::Counter => counter::increment(storage, &self.initial, ticket_type),
        }
    }
}
