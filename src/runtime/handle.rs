use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    core::{
        manager::{BatchOutcome, CancelOutcome, Processed, QueueError, QueueManager},
        queue::QueueView,
    },
    entry::Registration,
    journal::StoredTransaction,
    persist::Storage,
    types::{Availability, QueueStatus, SalesSummary, TicketStatus},
};

use super::events::DeskEvent;

/// Failure of a desk call.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The operation itself failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// The desk loop has stopped.
    #[error("ticket desk channel closed")]
    ChannelClosed,
    /// The blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
}

/// Desk loop channel sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Commands that may wait for the desk loop before senders block.
    pub command_queue_bound: usize,
    /// Broadcast buffer; slow subscribers lag past this many events.
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
        }
    }
}

/// Cloneable handle to a running ticket desk.
///
/// Every call is executed by a single loop, one at a time, so each
/// read-decide-write unit of the underlying [`QueueManager`] runs without
/// interleaving.
pub struct TicketDeskHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<DeskEvent>,
}

impl Clone for TicketDeskHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    Register {
        first_name: String,
        last_name: String,
        ticket_type: String,
        resp: Reply<Registration>,
    },
    ProcessNext {
        resp: Reply<Option<Processed>>,
    },
    ProcessOne {
        first_name: String,
        last_name: String,
        resp: Reply<Processed>,
    },
    ProcessAll {
        resp: Reply<BatchOutcome>,
    },
    Cancel {
        first_name: String,
        last_name: String,
        ticket_type: String,
        resp: Reply<CancelOutcome>,
    },
    Availability {
        resp: Reply<Availability>,
    },
    QueueStatus {
        resp: Reply<QueueStatus>,
    },
    Position {
        first_name: String,
        last_name: String,
        ticket_type: String,
        resp: Reply<Option<usize>>,
    },
    Waiting {
        resp: Reply<QueueView>,
    },
    Summary {
        resp: Reply<SalesSummary>,
    },
    Transactions {
        resp: Reply<Vec<StoredTransaction>>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

/// Starts the desk loop on the current tokio runtime and returns its handle.
pub fn spawn_ticket_desk<S: Storage + 'static>(
    manager: QueueManager<S>,
    config: RuntimeConfig,
) -> TicketDeskHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<DeskEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();
    let manager = Arc::new(Mutex::new(manager));

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            if handle_command(cmd, &manager, &events_tx_loop).await {
                break;
            }
        }
        debug!("ticket desk loop stopped");
    });

    TicketDeskHandle { cmd_tx, events_tx }
}

impl TicketDeskHandle {
    /// Subscribes to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.events_tx.subscribe()
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// See [`QueueManager::register`].
    pub async fn register(
        &self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        ticket_type: impl Into<String>,
    ) -> Result<Registration, RuntimeError> {
        let (first_name, last_name, ticket_type) =
            (first_name.into(), last_name.into(), ticket_type.into());
        self.call(|resp| Command::Register {
            first_name,
            last_name,
            ticket_type,
            resp,
        })
        .await
    }

    /// See [`QueueManager::process_next`].
    pub async fn process_next(&self) -> Result<Option<Processed>, RuntimeError> {
        self.call(|resp| Command::ProcessNext { resp }).await
    }

    /// See [`QueueManager::process_one`].
    pub async fn process_one(
        &self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Result<Processed, RuntimeError> {
        let (first_name, last_name) = (first_name.into(), last_name.into());
        self.call(|resp| Command::ProcessOne {
            first_name,
            last_name,
            resp,
        })
        .await
    }

    /// See [`QueueManager::process_all`].
    pub async fn process_all(&self) -> Result<BatchOutcome, RuntimeError> {
        self.call(|resp| Command::ProcessAll { resp }).await
    }

    /// See [`QueueManager::cancel`].
    pub async fn cancel(
        &self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        ticket_type: impl Into<String>,
    ) -> Result<CancelOutcome, RuntimeError> {
        let (first_name, last_name, ticket_type) =
            (first_name.into(), last_name.into(), ticket_type.into());
        self.call(|resp| Command::Cancel {
            first_name,
            last_name,
            ticket_type,
            resp,
        })
        .await
    }

    /// See [`QueueManager::availability`].
    pub async fn availability(&self) -> Result<Availability, RuntimeError> {
        self.call(|resp| Command::Availability { resp }).await
    }

    /// See [`QueueManager::queue_status`].
    pub async fn queue_status(&self) -> Result<QueueStatus, RuntimeError> {
        self.call(|resp| Command::QueueStatus { resp }).await
    }

    /// See [`QueueManager::position`].
    pub async fn position(
        &self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        ticket_type: impl Into<String>,
    ) -> Result<Option<usize>, RuntimeError> {
        let (first_name, last_name, ticket_type) =
            (first_name.into(), last_name.into(), ticket_type.into());
        self.call(|resp| Command::Position {
            first_name,
            last_name,
            ticket_type,
            resp,
        })
        .await
    }

    /// See [`QueueManager::waiting`].
    pub async fn waiting(&self) -> Result<QueueView, RuntimeError> {
        self.call(|resp| Command::Waiting { resp }).await
    }

    /// See [`QueueManager::summary`].
    pub async fn summary(&self) -> Result<SalesSummary, RuntimeError> {
        self.call(|resp| Command::Summary { resp }).await
    }

    /// See [`QueueManager::transactions`].
    pub async fn transactions(&self) -> Result<Vec<StoredTransaction>, RuntimeError> {
        self.call(|resp| Command::Transactions { resp }).await
    }

    /// Flushes the storage backend and stops the desk loop.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.call(|resp| Command::Shutdown { resp }).await
    }
}

async fn handle_command<S: Storage + 'static>(
    cmd: Command,
    manager: &Arc<Mutex<QueueManager<S>>>,
    events_tx: &broadcast::Sender<DeskEvent>,
) -> bool {
    match cmd {
        Command::Register {
            first_name,
            last_name,
            ticket_type,
            resp,
        } => {
            let res = run_blocking(manager, move |m| {
                m.register(&first_name, &last_name, &ticket_type)
            })
            .await;
            if let Ok(reg) = &res {
                let _ = events_tx.send(DeskEvent::Registered {
                    first_name: reg.entry.first_name.clone(),
                    last_name: reg.entry.last_name.clone(),
                    ticket_type: reg.entry.ticket_type,
                    position: reg.position,
                });
            }
            let _ = resp.send(res);
        }
        Command::ProcessNext { resp } => {
            let res = run_blocking(manager, |m| m.process_next()).await;
            if let Ok(Some(processed)) = &res {
                publish_processed(events_tx, processed);
                if processed.status() == TicketStatus::Confirmed {
                    let _ = events_tx.send(DeskEvent::AvailabilityChanged(processed.availability));
                }
            }
            let _ = resp.send(res);
        }
        Command::ProcessOne {
            first_name,
            last_name,
            resp,
        } => {
            let res = run_blocking(manager, move |m| m.process_one(&first_name, &last_name)).await;
            if let Ok(processed) = &res {
                publish_processed(events_tx, processed);
                if processed.status() == TicketStatus::Confirmed {
                    let _ = events_tx.send(DeskEvent::AvailabilityChanged(processed.availability));
                }
            }
            let _ = resp.send(res);
        }
        Command::ProcessAll { resp } => {
            let res = run_blocking(manager, |m| m.process_all()).await;
            if let Ok(batch) = &res {
                for processed in &batch.processed {
                    publish_processed(events_tx, processed);
                }
                if !batch.processed.is_empty() {
                    let _ = events_tx.send(DeskEvent::AvailabilityChanged(batch.availability));
                }
            }
            let _ = resp.send(res);
        }
        Command::Cancel {
            first_name,
            last_name,
            ticket_type,
            resp,
        } => {
            let res = run_blocking(manager, move |m| {
                m.cancel(&first_name, &last_name, &ticket_type)
            })
            .await;
            match &res {
                Ok(CancelOutcome::Withdrawn { entry }) => {
                    let _ = events_tx.send(DeskEvent::Withdrawn {
                        first_name: entry.first_name.clone(),
                        last_name: entry.last_name.clone(),
                        ticket_type: entry.ticket_type,
                    });
                }
                Ok(CancelOutcome::Returned {
                    seq,
                    record,
                    availability,
                }) => {
                    let _ = events_tx.send(DeskEvent::Returned {
                        seq: *seq,
                        first_name: record.first_name.clone(),
                        last_name: record.last_name.clone(),
                        ticket_type: record.ticket_type,
                    });
                    let _ = events_tx.send(DeskEvent::AvailabilityChanged(*availability));
                }
                Err(_) => {}
            }
            let _ = resp.send(res);
        }
        Command::Availability { resp } => {
            let _ = resp.send(run_blocking(manager, |m| m.availability()).await);
        }
        Command::QueueStatus { resp } => {
            let _ = resp.send(run_blocking(manager, |m| m.queue_status()).await);
        }
        Command::Position {
            first_name,
            last_name,
            ticket_type,
            resp,
        } => {
            let res = run_blocking(manager, move |m| {
                m.position(&first_name, &last_name, &ticket_type)
            })
            .await;
            let _ = resp.send(res);
        }
        Command::Waiting { resp } => {
            let _ = resp.send(run_blocking(manager, |m| m.waiting()).await);
        }
        Command::Summary { resp } => {
            let _ = resp.send(run_blocking(manager, |m| m.summary()).await);
        }
        Command::Transactions { resp } => {
            let _ = resp.send(run_blocking(manager, |m| m.transactions()).await);
        }
        Command::Shutdown { resp } => {
            let res = run_blocking(manager, |m| {
                m.storage_mut().flush().map_err(QueueError::from)
            })
            .await;
            if let Err(err) = &res {
                warn!(error = %err, "flush on shutdown failed");
            }
            let _ = resp.send(res);
            return true;
        }
    }

    false
}

fn publish_processed(events_tx: &broadcast::Sender<DeskEvent>, processed: &Processed) {
    let _ = events_tx.send(DeskEvent::Processed {
        seq: processed.seq,
        first_name: processed.record.first_name.clone(),
        last_name: processed.record.last_name.clone(),
        ticket_type: processed.record.ticket_type,
        status: processed.record.status,
    });
}

async fn run_blocking<S, T, F>(
    manager: &Arc<Mutex<QueueManager<S>>>,
    f: F,
) -> Result<T, RuntimeError>
where
    S: Storage + 'static,
    T: Send + 'static,
    F: FnOnce(&mut QueueManager<S>) -> Result<T, QueueError> + Send + 'static,
{
    let manager = Arc::clone(manager);
    tokio::task::spawn_blocking(move || {
        let mut guard = manager.blocking_lock();
        f(&mut *guard)
    })
    .await
    .map_err(|e| RuntimeError::Join(e.to_string()))?
    .map_err(RuntimeError::from)
}
