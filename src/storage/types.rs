//! Core data types for the storage layer.
//!
//! - [`ErrorRecord`]: one failed capture attempt
//! - [`ServerStatusEntry`] / [`TimedEntry`]: per-round results of a target family
//! - [`ArtifactIndex`]: manifest of every file written to the bundle
//! - [`DebugIndex`]: the bundle index document

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::{HealthStatus, SealStatus};

/// Format version of the bundle index document.
pub const INDEX_VERSION: u32 = 1;

/// Sortable, filesystem-friendly timestamp format for round directories.
pub const ROUND_DIR_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

/// Format a round directory name from its capture timestamp.
pub fn round_dir_name(timestamp: DateTime<Utc>) -> String {
    timestamp.format(ROUND_DIR_FORMAT).to_string()
}

/// A failed capture attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Error message.
    #[serde(rename = "error")]
    pub message: String,
    /// Dotted capture name, e.g. `pprof.heap`.
    pub target: String,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Create a record for `target`.
    pub fn new(
        target: impl Into<String>,
        err: &dyn std::fmt::Display,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let target = target.into();
        debug_assert!(!target.is_empty(), "error record without target");
        Self {
            message: err.to_string(),
            target,
            timestamp,
        }
    }
}

/// Health and seal status observed in one primary round.
///
/// Either half is empty when its request failed; the failure is in the
/// error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatusEntry {
    pub timestamp: DateTime<Utc>,
    pub health: Option<HealthStatus>,
    pub seal: Option<SealStatus>,
}

/// A structured result captured at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEntry {
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// Files written for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundArtifacts {
    pub timestamp: DateTime<Utc>,
    pub files: Vec<String>,
}

/// Manifest of the bundle: session-level files plus one entry per round
/// directory.
///
/// Only files that were actually written are ever recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactIndex {
    /// Session-level files.
    pub files: Vec<String>,
    /// Round directory name to its files, sorted chronologically.
    #[serde(flatten)]
    pub rounds: BTreeMap<String, RoundArtifacts>,
}

impl ArtifactIndex {
    /// Register a round captured at `timestamp` and return its directory name.
    ///
    /// Rounds that format to the same second get a `-N` suffix.
    pub fn register_round(&mut self, timestamp: DateTime<Utc>) -> String {
        let base = round_dir_name(timestamp);
        let mut name = base.clone();
        let mut suffix = 1;
        while self.rounds.contains_key(&name) {
            name = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.rounds.insert(
            name.clone(),
            RoundArtifacts {
                timestamp,
                files: Vec::new(),
            },
        );
        name
    }

    /// Forget a round whose directory could not be created.
    pub fn discard_round(&mut self, name: &str) -> bool {
        self.rounds.remove(name).is_some()
    }

    /// Record a written file, in a round directory or at session level.
    ///
    /// Returns `false` if the round is unknown.
    pub fn record_file(&mut self, round: Option<&str>, file: impl Into<String>) -> bool {
        match round {
            None => {
                self.files.push(file.into());
                true
            }
            Some(name) => match self.rounds.get_mut(name) {
                Some(entry) => {
                    entry.files.push(file.into());
                    true
                }
                None => false,
            },
        }
    }

    /// Files recorded for a round.
    pub fn round_files(&self, name: &str) -> Option<&[String]> {
        self.rounds.get(name).map(|r| r.files.as_slice())
    }
}

/// The bundle index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugIndex {
    pub vault_address: String,
    pub version: u32,
    pub client_version: String,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: u64,
    pub interval_seconds: u64,
    pub metrics_interval_seconds: u64,
    pub raw_args: Vec<String>,
    pub targets: Vec<String>,
    /// Whether the bundle directory is packed into an archive afterwards.
    pub compress: bool,
    pub output: ArtifactIndex,
    pub errors: Vec<ErrorRecord>,
}
