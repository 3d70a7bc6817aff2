//! Two-tier ticket queue with an append-only transaction log.
//!
//! Buyers register into a VIP or Regular sub-queue. Processing always drains
//! VIP first, confirming a ticket while inventory remains and logging
//! `Sold Out` otherwise. Availability is derived either by replaying the log
//! or from a persisted counter.
//!
//! # Examples
//!
//! In-memory usage with [`core::manager::QueueManager`]:
//! ```
//! use ticketline::{
//!     core::manager::QueueManager,
//!     inventory::AvailabilityMode,
//!     persist::memory::MemoryStorage,
//!     types::{Inventory, TicketStatus},
//! };
//!
//! let mut desk = QueueManager::new(
//!     MemoryStorage::new(),
//!     Inventory::new(1, 1),
//!     AvailabilityMode::Replay,
//! );
//! desk.register("Ada", "Lovelace", "Regular").unwrap();
//! desk.register("Alan", "Turing", "VIP").unwrap();
//!
//! let first = desk.process_next().unwrap().unwrap();
//! assert_eq!(first.record.first_name, "Alan");
//! assert_eq!(first.status(), TicketStatus::Confirmed);
//! assert_eq!(desk.availability().unwrap().vip, 0);
//! ```
//!
//! Runtime usage with SQLite storage:
//! ```no_run
//! use ticketline::{
//!     core::manager::QueueManager,
//!     inventory::AvailabilityMode,
//!     persist::sqlite::SqliteStorage,
//!     runtime::handle::{spawn_ticket_desk, RuntimeConfig},
//!     types::Inventory,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let storage = SqliteStorage::open("tickets.db").expect("open sqlite");
//! let manager = QueueManager::new(storage, Inventory::default(), AvailabilityMode::Replay);
//! let desk = spawn_ticket_desk(manager, RuntimeConfig::default());
//! desk.register("Grace", "Hopper", "VIP").await.expect("register");
//! let batch = desk.process_all().await.expect("process");
//! println!("{} settled", batch.processed.len());
//! desk.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// File and environment configuration.
pub mod config;
/// Queue state and processing.
pub mod core;
/// Queue entries and registration receipts.
pub mod entry;
/// Availability strategies.
pub mod inventory;
/// Transaction log records and envelope codec.
pub mod journal;
/// Storage abstraction and backends.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
