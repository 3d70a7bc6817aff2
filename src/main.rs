//! `ticketline`: command-line front end for the ticket desk.

mod cli;

use std::{error::Error, fmt::Write as _, process::ExitCode};

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};
use ticketline::{
    config::DeskConfig,
    core::{
        manager::{BatchOutcome, CancelOutcome, Processed},
        queue::QueueView,
    },
    journal::StoredTransaction,
    runtime::handle::{TicketDeskHandle, spawn_ticket_desk},
    types::{Availability, SalesSummary},
};

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ticketline=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult {
    let config = DeskConfig::load(cli.config.as_deref())?;
    debug!(
        backend = ?config.storage.backend,
        path = %config.storage.path.display(),
        availability = ?config.availability,
        "configuration loaded"
    );

    let manager = config.build_manager()?;
    let desk = spawn_ticket_desk(manager, config.runtime.clone());
    let result = dispatch(&desk, cli.command, cli.json).await;
    desk.shutdown().await?;
    result
}

async fn dispatch(desk: &TicketDeskHandle, command: Commands, json: bool) -> CliResult {
    match command {
        Commands::Register {
            first_name,
            last_name,
            ticket_type,
        } => {
            let reg = desk.register(first_name, last_name, ticket_type).await?;
            emit(json, &reg, |r| {
                format!(
                    "registered {} for {} (position {} in the {} queue)",
                    r.entry.full_name(),
                    r.entry.ticket_type,
                    r.position,
                    r.entry.ticket_type
                )
            })
        }
        Commands::Next => match desk.process_next().await? {
            Some(processed) => emit(json, &processed, format_processed),
            None => emit(json, &json!(null), |_| "no one in queue".to_string()),
        },
        Commands::Process {
            first_name,
            last_name,
        } => {
            let processed = desk.process_one(first_name, last_name).await?;
            emit(json, &processed, format_processed)
        }
        Commands::ProcessAll => {
            let batch = desk.process_all().await?;
            emit(json, &batch, format_batch)
        }
        Commands::Cancel {
            first_name,
            last_name,
            ticket_type,
        } => {
            let outcome = desk.cancel(first_name, last_name, ticket_type).await?;
            emit(json, &outcome, format_cancel)
        }
        Commands::Availability => {
            let available = desk.availability().await?;
            emit(json, &available, format_availability)
        }
        Commands::Status => {
            let status = desk.queue_status().await?;
            emit(json, &status, |s| {
                format!("VIP queue: {}\nRegular queue: {}", s.vip_queue, s.regular_queue)
            })
        }
        Commands::Queue => {
            let view = desk.waiting().await?;
            emit(json, &view, format_queue)
        }
        Commands::Position {
            first_name,
            last_name,
            ticket_type,
        } => {
            let position = desk.position(first_name, last_name, ticket_type).await?;
            emit(json, &json!({ "position": position }), |_| match position {
                Some(n) => format!("position {n}"),
                None => "not in queue".to_string(),
            })
        }
        Commands::Summary => {
            let summary = desk.summary().await?;
            emit(json, &summary, format_summary)
        }
        Commands::Log => {
            let log = desk.transactions().await?;
            emit(json, &log, |log| format_log(log))
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

fn format_processed(p: &Processed) -> String {
    format!(
        "#{} {} {} ({}): {}",
        p.seq, p.record.first_name, p.record.last_name, p.record.ticket_type, p.record.status
    )
}

fn format_batch(batch: &BatchOutcome) -> String {
    let mut out = String::new();
    for processed in &batch.processed {
        let _ = writeln!(out, "{}", format_processed(processed));
    }
    if batch.processed.is_empty() {
        out.push_str("no one in queue\n");
    }
    out.push_str(&format_availability(&batch.availability));
    out
}

fn format_cancel(outcome: &CancelOutcome) -> String {
    match outcome {
        CancelOutcome::Withdrawn { entry } => {
            format!("withdrew {} from the {} queue", entry.full_name(), entry.ticket_type)
        }
        CancelOutcome::Returned {
            seq,
            record,
            availability,
        } => format!(
            "#{seq} returned {} ticket for {} {} ({} {} left)",
            record.ticket_type,
            record.first_name,
            record.last_name,
            availability.get(record.ticket_type),
            record.ticket_type
        ),
    }
}

fn format_availability(a: &Availability) -> String {
    format!("VIP: {}\nRegular: {}", a.vip, a.regular)
}

fn format_queue(view: &QueueView) -> String {
    let mut out = String::new();
    for (label, entries) in [("VIP", &view.vip), ("Regular", &view.regular)] {
        let _ = writeln!(out, "{label} queue ({}):", entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {} ({})",
                idx + 1,
                entry.full_name(),
                entry.registered_at.to_rfc3339()
            );
        }
    }
    out.trim_end().to_string()
}

fn format_summary(s: &SalesSummary) -> String {
    format!(
        "VIP: {} sold, {} remaining of {}\nRegular: {} sold, {} remaining of {}\nTotal: {} sold, {} remaining",
        s.vip.sold,
        s.vip.remaining,
        s.vip.total,
        s.regular.sold,
        s.regular.remaining,
        s.regular.total,
        s.total_sold,
        s.total_remaining
    )
}

fn format_log(log: &[StoredTransaction]) -> String {
    if log.is_empty() {
        return "no transactions".to_string();
    }
    log.iter()
        .map(|s| {
            format!(
                "#{} {} {} {} {} {}",
                s.seq,
                s.record.time.to_rfc3339(),
                s.record.ticket_type,
                s.record.status,
                s.record.first_name,
                s.record.last_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
