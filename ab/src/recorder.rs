//! Recorder - actor that owns the run store
//!
//! Concurrent runs hand sealed records to one task, so appends never
//! interleave within this process. The store's file lock covers other
//! processes writing the same directory.

use runledger::{LedgerError, RunRecord, RunStore};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Channel error")]
    ChannelError,

    #[error("Store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type RecorderResponse<T> = Result<T, RecorderError>;

#[derive(Debug)]
enum RecorderCommand {
    Append {
        record: Box<RunRecord>,
        reply: oneshot::Sender<RecorderResponse<PathBuf>>,
    },
    Count {
        reply: oneshot::Sender<RecorderResponse<usize>>,
    },
    Shutdown,
}

/// Handle to send records to the Recorder
#[derive(Clone)]
pub struct Recorder {
    tx: mpsc::Sender<RecorderCommand>,
}

impl Recorder {
    /// Open the store and spawn the actor
    pub fn spawn(dir: impl AsRef<Path>) -> RecorderResponse<Self> {
        debug!(dir = %dir.as_ref().display(), "spawn: called");
        let store = RunStore::open(dir.as_ref())?;
        info!(dir = %store.dir().display(), "Recorder spawned");
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(actor_loop(store, rx));
        Ok(Self { tx })
    }

    /// Persist a sealed record; returns the file written
    pub async fn append(&self, record: RunRecord) -> RecorderResponse<PathBuf> {
        debug!(run_id = %record.id, "append: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Append {
                record: Box::new(record),
                reply: reply_tx,
            })
            .await
            .map_err(|_| RecorderError::ChannelError)?;
        reply_rx.await.map_err(|_| RecorderError::ChannelError)?
    }

    /// Number of record files in the store
    pub async fn count(&self) -> RecorderResponse<usize> {
        debug!("count: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Count { reply: reply_tx })
            .await
            .map_err(|_| RecorderError::ChannelError)?;
        reply_rx.await.map_err(|_| RecorderError::ChannelError)?
    }

    pub async fn shutdown(&self) -> RecorderResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(RecorderCommand::Shutdown)
            .await
            .map_err(|_| RecorderError::ChannelError)
    }
}

async fn actor_loop(store: RunStore, mut rx: mpsc::Receiver<RecorderCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RecorderCommand::Append { record, reply } => {
                debug!(run_id = %record.id, "actor_loop: Append command");
                let run_id = record.id.clone();
                // file lock and fsync stay off the async workers
                let blocking = store.clone();
                let result = match tokio::task::spawn_blocking(move || blocking.append(&record)).await {
                    Ok(appended) => appended.map_err(RecorderError::from),
                    Err(e) => Err(RecorderError::from(e)),
                };
                if let Err(e) = &result {
                    warn!(%run_id, error = %e, "Failed to persist run record");
                }
                let _ = reply.send(result);
            }

            RecorderCommand::Count { reply } => {
                debug!("actor_loop: Count command");
                let _ = reply.send(store.list().map(|paths| paths.len()).map_err(RecorderError::from));
            }

            RecorderCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("Recorder shutting down");
                break;
            }
        }
    }

    debug!("Recorder actor stopped");
}
