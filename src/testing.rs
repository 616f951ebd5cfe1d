//! Test doubles shared by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use crate::collector::{CaptureClient, CaptureError, HealthStatus, SealStatus};
use crate::storage::{ArtifactSink, StorageError};

/// One recorded call to the scripted client.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call {
    pub op: &'static str,
    pub start: Instant,
    pub end: Instant,
}

/// Scripted [`CaptureClient`].
///
/// Profile and trace sleep for the requested number of seconds on the tokio
/// clock, so paused-time tests observe realistic overlap.
pub(crate) struct MockClient {
    health: Mutex<HealthStatus>,
    failing: Mutex<HashSet<&'static str>>,
    delays: Mutex<BTreeMap<&'static str, Duration>>,
    calls: Mutex<Vec<Call>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            health: Mutex::new(HealthStatus {
                initialized: true,
                ..HealthStatus::default()
            }),
            failing: Mutex::new(HashSet::new()),
            delays: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_health(self, health: HealthStatus) -> Self {
        *self.health.lock().unwrap() = health;
        self
    }

    /// Make every call to `op` fail.
    pub fn failing(self, op: &'static str) -> Self {
        self.failing.lock().unwrap().insert(op);
        self
    }

    /// Make every call to `op` take `delay`.
    pub fn with_delay(self, op: &'static str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(op, delay);
        self
    }

    pub fn calls(&self, op: &str) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.op == op)
            .copied()
            .collect()
    }

    async fn call(&self, op: &'static str, sampled: Option<u64>) -> Result<(), CaptureError> {
        let start = Instant::now();
        let delay = self.delays.lock().unwrap().get(op).copied();
        let delay = delay.or(sampled.map(Duration::from_secs));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(Call {
            op,
            start,
            end: Instant::now(),
        });

        if self.failing.lock().unwrap().contains(op) {
            return Err(CaptureError::Status {
                path: format!("/v1/sys/{op}"),
                status: 500,
                body: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CaptureClient for MockClient {
    fn address(&self) -> &str {
        "http://vault.test:8200"
    }

    async fn check_health(&self) -> Result<HealthStatus, CaptureError> {
        self.call("health", None).await?;
        Ok(self.health.lock().unwrap().clone())
    }

    async fn check_seal_status(&self) -> Result<SealStatus, CaptureError> {
        self.call("seal", None).await?;
        Ok(SealStatus {
            seal_type: "shamir".to_string(),
            initialized: true,
            ..SealStatus::default()
        })
    }

    async fn capture_goroutine(&self) -> Result<Vec<u8>, CaptureError> {
        self.call("goroutine", None).await?;
        Ok(b"goroutine".to_vec())
    }

    async fn capture_heap(&self) -> Result<Vec<u8>, CaptureError> {
        self.call("heap", None).await?;
        Ok(b"heap".to_vec())
    }

    async fn capture_profile(&self, seconds: u64) -> Result<Vec<u8>, CaptureError> {
        self.call("profile", Some(seconds)).await?;
        Ok(b"profile".to_vec())
    }

    async fn capture_trace(&self, seconds: u64) -> Result<Vec<u8>, CaptureError> {
        self.call("trace", Some(seconds)).await?;
        Ok(b"trace".to_vec())
    }

    async fn fetch_metrics(&self) -> Result<serde_json::Value, CaptureError> {
        self.call("metrics", None).await?;
        Ok(json!({"Gauges": [], "Counters": [], "Samples": []}))
    }

    async fn fetch_host_info(&self) -> Result<serde_json::Value, CaptureError> {
        self.call("host-info", None).await?;
        Ok(json!({"host": {"hostname": "vault-0"}}))
    }

    async fn fetch_replication_status(&self) -> Result<serde_json::Value, CaptureError> {
        self.call("replication", None).await?;
        Ok(json!({"data": {"dr": {"mode": "disabled"}}}))
    }

    async fn fetch_config_state(&self) -> Result<serde_json::Value, CaptureError> {
        self.call("config", None).await?;
        Ok(json!({"data": {"storage": {"type": "raft"}}}))
    }
}

/// In-memory [`ArtifactSink`].
#[derive(Default)]
pub(crate) struct MemorySink {
    dirs: Mutex<BTreeSet<String>>,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    failing_dirs: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes of `file` (any round) fail.
    pub fn failing(self, file: &str) -> Self {
        self.failing.lock().unwrap().insert(file.to_owned());
        self
    }

    /// Make every round directory creation fail.
    pub fn failing_round_dirs(mut self) -> Self {
        self.failing_dirs = true;
        self
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn dirs(&self) -> Vec<String> {
        self.dirs.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait::async_trait]
impl ArtifactSink for MemorySink {
    async fn create_round_dir(&self, round: &str) -> Result<(), StorageError> {
        if self.failing_dirs {
            return Err(StorageError::Io(std::io::Error::other("simulated mkdir failure")));
        }
        self.dirs.lock().unwrap().insert(round.to_owned());
        Ok(())
    }

    async fn write(&self, round: Option<&str>, file: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.failing.lock().unwrap().contains(file) {
            return Err(StorageError::Io(std::io::Error::other("simulated write failure")));
        }
        let path = match round {
            Some(dir) => {
                if !self.dirs.lock().unwrap().contains(dir) {
                    return Err(StorageError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "round directory missing",
                    )));
                }
                format!("{dir}/{file}")
            }
            None => file.to_owned(),
        };
        self.files.lock().unwrap().insert(path, data.to_vec());
        Ok(())
    }
}
