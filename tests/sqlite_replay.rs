use tempfile::TempDir;

use ticketline::{
    core::manager::QueueManager,
    inventory::AvailabilityMode,
    persist::{Storage, sqlite::SqliteStorage},
    types::{Availability, Inventory, TicketStatus, TicketType},
};

#[test]
fn sqlite_state_survives_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("nested").join("tickets.db");

    let mut m = QueueManager::new(
        SqliteStorage::open(&db_path).expect("open sqlite"),
        Inventory::new(1, 2),
        AvailabilityMode::Replay,
    );
    m.register("A", "One", "VIP").expect("A");
    m.register("B", "Two", "VIP").expect("B");
    m.register("C", "Three", "Regular").expect("C");
    m.register("D", "Four", "Regular").expect("D");
    m.process_next().expect("A");
    m.process_next().expect("B");
    let queue_before = m.waiting().expect("view");
    drop(m);

    let mut m = QueueManager::new(
        SqliteStorage::open(&db_path).expect("reopen"),
        Inventory::new(1, 2),
        AvailabilityMode::Replay,
    );
    assert_eq!(m.waiting().expect("view"), queue_before);
    assert_eq!(m.availability().expect("avail"), Availability { vip: 0, regular: 2 });

    let log = m.transactions().expect("log");
    let seqs: Vec<_> = log.iter().map(|s| s.seq).collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(log[1].record.status, TicketStatus::SoldOut);

    m.process_all().expect("process rest");
    assert_eq!(m.storage().latest_seq().expect("seq"), 4);
    assert_eq!(
        m.storage()
            .count_status(TicketType::Regular, TicketStatus::Confirmed)
            .expect("count"),
        2
    );
}

#[test]
fn sqlite_counter_round_trips() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("tickets.db");

    let mut storage = SqliteStorage::open(&db_path).expect("open sqlite");
    assert_eq!(storage.load_counter().expect("counter"), None);
    storage
        .save_counter(&Availability { vip: 2, regular: 1 })
        .expect("save");
    storage
        .save_counter(&Availability { vip: 1, regular: 1 })
        .expect("overwrite");
    storage.flush().expect("flush");
    drop(storage);

    let mut m = QueueManager::new(
        SqliteStorage::open(&db_path).expect("reopen"),
        Inventory::new(3, 5),
        AvailabilityMode::Counter,
    );
    assert_eq!(m.availability().expect("avail"), Availability { vip: 1, regular: 1 });
}
