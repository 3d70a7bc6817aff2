//! Availability kept as a persisted, directly mutated counter record.

use crate::{
    persist::{PersistResult, Storage},
    types::{Availability, Inventory, TicketType},
};

/// Reads the counter, writing `initial` first if no counter exists yet.
pub fn read<S: Storage + ?Sized>(storage: &mut S, initial: &Inventory) -> PersistResult<Availability> {
    if let Some(counter) = storage.load_counter()? {
        return Ok(counter);
    }
    let counter = initial.full();
    storage.save_counter(&counter)?;
    tracing::debug!(vip = counter.vip, regular = counter.regular, "initialized availability counter");
    Ok(counter)
}

/// Consumes one unit of `ticket_type`; the stored value never drops below zero.
pub fn decrement<S: Storage + ?Sized>(
    storage: &mut S,
    initial: &Inventory,
    ticket_type: TicketType,
) -> PersistResult<Availability> {
    let mut counter = read(storage, initial)?;
    counter.decrement(ticket_type);
    storage.save_counter(&counter)?;
    Ok(counter)
}

/// Returns one unit of `ticket_type`.
pub fn increment<S: Storage + ?Sized>(
    storage: &mut S,
    initial: &Inventory,
    ticket_type: TicketType,
) -> PersistResult<Availability> {
    let mut counter = read(storage, initial)?;
    counter.increment(ticket_type);
    storage.save_counter(&counter)?;
    Ok(counter)
}
