//! Accumulator actor with an MPSC command channel.
//!
//! Single-writer pattern: one task owns the artifact index and every result
//! collection, and applies commands in arrival order. Round tasks never touch
//! the shared state directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::storage::types::{ArtifactIndex, ServerStatusEntry, TimedEntry};

// =============================================================================
// Commands
// =============================================================================

/// Commands sent to the accumulator actor.
#[derive(Debug)]
pub enum Command {
    /// Register a round directory; replies with its unique name.
    RegisterRound {
        timestamp: DateTime<Utc>,
        reply: oneshot::Sender<String>,
    },
    /// Drop a round whose directory could not be created.
    DiscardRound(String),
    /// Record a file that has been written.
    RecordFile { round: Option<String>, file: String },
    /// Append a server-status entry for round `seq`.
    ServerStatus { seq: u64, entry: ServerStatusEntry },
    /// Append a metrics snapshot for round `seq`.
    Metrics { seq: u64, value: serde_json::Value },
    /// Append a host-info entry for round `seq`.
    HostInfo { seq: u64, entry: TimedEntry },
    /// Append a replication-status entry for round `seq`.
    ReplicationStatus { seq: u64, entry: TimedEntry },
    /// Stop and hand back everything collected.
    Finish(oneshot::Sender<Accumulated>),
}

// =============================================================================
// Output
// =============================================================================

/// Everything collected during a session, ordered by round initiation.
#[derive(Debug, Clone, Default)]
pub struct Accumulated {
    pub index: ArtifactIndex,
    pub server_status: Vec<ServerStatusEntry>,
    pub metrics: Vec<serde_json::Value>,
    pub host_info: Vec<TimedEntry>,
    pub replication_status: Vec<TimedEntry>,
}

/// Results of one target family keyed by round sequence number, so the
/// timeline follows round initiation rather than completion.
struct Timeline<T> {
    family: &'static str,
    entries: BTreeMap<u64, T>,
}

impl<T> Timeline<T> {
    fn new(family: &'static str) -> Self {
        Self {
            family,
            entries: BTreeMap::new(),
        }
    }

    fn insert(&mut self, seq: u64, item: T) {
        if self.entries.insert(seq, item).is_some() {
            tracing::warn!(family = self.family, round = seq, "Duplicate round result replaced");
        }
    }

    fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Result accumulator actor.
pub struct Accumulator {
    rx: mpsc::Receiver<Command>,
    index: ArtifactIndex,
    server_status: Timeline<ServerStatusEntry>,
    metrics: Timeline<serde_json::Value>,
    host_info: Timeline<TimedEntry>,
    replication_status: Timeline<TimedEntry>,
}

impl Accumulator {
    /// Spawn the actor task.
    ///
    /// Returns the task handle and the command sender.
    pub fn spawn(channel_capacity: usize) -> (JoinHandle<()>, mpsc::Sender<Command>) {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let actor = Accumulator {
            rx,
            index: ArtifactIndex::default(),
            server_status: Timeline::new("server-status"),
            metrics: Timeline::new("metrics"),
            host_info: Timeline::new("host"),
            replication_status: Timeline::new("replication-status"),
        };
        let handle = tokio::spawn(actor.run());
        (handle, tx)
    }

    async fn run(mut self) {
        tracing::debug!("Accumulator started");

        while let Some(cmd) = self.rx.recv().await {
            if self.handle_command(cmd) {
                tracing::debug!("Accumulator stopped");
                return;
            }
        }

        tracing::warn!("Channel disconnected before finish, results discarded");
    }

    /// Apply one command. Returns `true` once the actor should stop.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::RegisterRound { timestamp, reply } => {
                let name = self.index.register_round(timestamp);
                if let Err(name) = reply.send(name) {
                    // Caller went away; keep the index free of unused rounds.
                    self.index.discard_round(&name);
                }
            }
            Command::DiscardRound(name) => {
                self.index.discard_round(&name);
            }
            Command::RecordFile { round, file } => {
                if !self.index.record_file(round.as_deref(), file.as_str()) {
                    tracing::warn!(round = ?round, file = %file, "File recorded for unknown round");
                }
            }
            Command::ServerStatus { seq, entry } => self.server_status.insert(seq, entry),
            Command::Metrics { seq, value } => self.metrics.insert(seq, value),
            Command::HostInfo { seq, entry } => self.host_info.insert(seq, entry),
            Command::ReplicationStatus { seq, entry } => self.replication_status.insert(seq, entry),
            Command::Finish(reply) => {
                let accumulated = self.drain();
                if reply.send(accumulated).is_err() {
                    tracing::warn!("Accumulator finish reply dropped");
                }
                return true;
            }
        }
        false
    }

    fn drain(&mut self) -> Accumulated {
        Accumulated {
            index: std::mem::take(&mut self.index),
            server_status: self.server_status.take(),
            metrics: self.metrics.take(),
            host_info: self.host_info.take(),
            replication_status: self.replication_status.take(),
        }
    }
}
