//! Core capture traits and types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StorageError;

/// Errors that can occur during capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Transport-level HTTP failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Failed to hand results to the accumulator or write an artifact.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Response of the health endpoint.
///
/// Only the fields the scheduler reasons about are typed; everything is
/// optional so partial responses still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub performance_standby: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_performance_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_dr_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time_utc: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

impl HealthStatus {
    /// Whether this node is a disaster-recovery secondary.
    pub fn is_dr_secondary(&self) -> bool {
        self.replication_dr_mode.as_deref() == Some("secondary")
    }

    /// Whether this node is a standby that cannot serve reads locally.
    pub fn is_non_performance_standby(&self) -> bool {
        self.standby && !self.performance_standby
    }

    /// Reason to skip metrics capture on this node, if any.
    ///
    /// Metrics requests on these nodes are forwarded to the active node and
    /// would not describe the node being debugged.
    pub fn metrics_skip_reason(&self) -> Option<&'static str> {
        if self.is_dr_secondary() {
            Some("DR secondary node")
        } else if self.is_non_performance_standby() {
            Some("standby node")
        } else {
            None
        }
    }
}

/// Response of the seal status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SealStatus {
    #[serde(rename = "type", default)]
    pub seal_type: String,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(rename = "t", default)]
    pub threshold: u32,
    #[serde(rename = "n", default)]
    pub shares: u32,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub migration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub recovery_seal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}

/// Narrow interface to the remote system being debugged.
///
/// Every method performs exactly one request. Implementations must not retry;
/// failures are recorded by the scheduler and the session moves on.
#[async_trait::async_trait]
pub trait CaptureClient: Send + Sync + 'static {
    /// Address of the server, recorded in the bundle index.
    fn address(&self) -> &str;

    /// Health, replication mode and standby flags.
    async fn check_health(&self) -> Result<HealthStatus, CaptureError>;

    /// Seal status.
    async fn check_seal_status(&self) -> Result<SealStatus, CaptureError>;

    /// Goroutine profile snapshot.
    async fn capture_goroutine(&self) -> Result<Vec<u8>, CaptureError>;

    /// Heap profile snapshot.
    async fn capture_heap(&self) -> Result<Vec<u8>, CaptureError>;

    /// CPU profile; blocks for roughly `seconds`.
    async fn capture_profile(&self, seconds: u64) -> Result<Vec<u8>, CaptureError>;

    /// Execution trace; blocks for roughly `seconds`.
    async fn capture_trace(&self, seconds: u64) -> Result<Vec<u8>, CaptureError>;

    /// Telemetry metrics snapshot.
    async fn fetch_metrics(&self) -> Result<serde_json::Value, CaptureError>;

    /// Host information.
    async fn fetch_host_info(&self) -> Result<serde_json::Value, CaptureError>;

    /// Replication status.
    async fn fetch_replication_status(&self) -> Result<serde_json::Value, CaptureError>;

    /// Sanitized configuration state.
    async fn fetch_config_state(&self) -> Result<serde_json::Value, CaptureError>;
}
