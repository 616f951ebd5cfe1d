//! User-facing accumulator facade.
//!
//! [`ResultWriter`] is a cheap, cloneable handle that round tasks use to hand
//! results to the accumulator actor.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::storage::StorageError;
use crate::storage::actor::{Accumulated, Accumulator, Command};
use crate::storage::types::{ServerStatusEntry, TimedEntry};

/// Default channel capacity for accumulator commands.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Cloneable write handle to the accumulator actor.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    tx: mpsc::Sender<Command>,
}

impl ResultWriter {
    /// Spawn an accumulator and return a writer plus the actor task handle.
    pub fn spawn(channel_capacity: usize) -> (Self, JoinHandle<()>) {
        let (handle, tx) = Accumulator::spawn(channel_capacity);
        (Self { tx }, handle)
    }

    async fn send(&self, cmd: Command) -> Result<(), StorageError> {
        self.tx.send(cmd).await.map_err(|_| StorageError::ChannelSend)
    }

    /// Register a round captured at `timestamp` and get its directory name.
    pub async fn register_round(&self, timestamp: DateTime<Utc>) -> Result<String, StorageError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RegisterRound { timestamp, reply })
            .await?;
        rx.await.map_err(|_| StorageError::ChannelRecv)
    }

    /// Drop a registered round that produced no directory.
    pub async fn discard_round(&self, name: impl Into<String>) -> Result<(), StorageError> {
        self.send(Command::DiscardRound(name.into())).await
    }

    /// Record a written file. `round` is `None` for session-level files.
    pub async fn record_file(
        &self,
        round: Option<&str>,
        file: impl Into<String>,
    ) -> Result<(), StorageError> {
        self.send(Command::RecordFile {
            round: round.map(str::to_owned),
            file: file.into(),
        })
        .await
    }

    /// Append a server-status entry for round `seq`.
    pub async fn push_server_status(
        &self,
        seq: u64,
        entry: ServerStatusEntry,
    ) -> Result<(), StorageError> {
        self.send(Command::ServerStatus { seq, entry }).await
    }

    /// Append a metrics snapshot for round `seq`.
    pub async fn push_metrics(&self, seq: u64, value: serde_json::Value) -> Result<(), StorageError> {
        self.send(Command::Metrics { seq, value }).await
    }

    /// Append host information for round `seq`.
    pub async fn push_host_info(&self, seq: u64, entry: TimedEntry) -> Result<(), StorageError> {
        self.send(Command::HostInfo { seq, entry }).await
    }

    /// Append replication status for round `seq`.
    pub async fn push_replication_status(
        &self,
        seq: u64,
        entry: TimedEntry,
    ) -> Result<(), StorageError> {
        self.send(Command::ReplicationStatus { seq, entry }).await
    }

    /// Stop the accumulator and collect its contents.
    ///
    /// Call only after every producer has finished; later writes fail with
    /// [`StorageError::ChannelSend`].
    pub async fn finish(&self) -> Result<Accumulated, StorageError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Finish(reply)).await?;
        rx.await.map_err(|_| StorageError::ChannelRecv)
    }
}
