use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ticketline",
    about = "Two-tier ticket queue with an append-only transaction log",
    version
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Join the VIP or Regular queue
    Register {
        first_name: String,
        last_name: String,
        /// VIP or Regular (any case)
        ticket_type: String,
    },

    /// Settle the next waiting buyer, VIP first
    Next,

    /// Settle one named buyer
    Process { first_name: String, last_name: String },

    /// Settle everyone waiting
    ProcessAll,

    /// Withdraw a pending entry or return a confirmed ticket
    Cancel {
        first_name: String,
        last_name: String,
        ticket_type: String,
    },

    /// Remaining tickets per type
    Availability,

    /// Waiting counts per sub-queue
    Status,

    /// Everyone waiting, per sub-queue
    Queue,

    /// Position of a buyer within their sub-queue
    Position {
        first_name: String,
        last_name: String,
        ticket_type: String,
    },

    /// Sold and remaining tickets
    Summary,

    /// Full transaction log
    Log,
}
