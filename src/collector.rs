//! Capture Layer
//!
//! Polling scheduler that captures debug data from a Vault server over a
//! bounded session. Rounds run in their own Tokio tasks and hand results to
//! storage via MPSC channel.
//!
//! # Architecture
//!
//! - [`CaptureClient`]: Narrow interface issuing one capture request per call
//! - [`CaptureTarget`] / [`TargetSet`]: Named targets and the enabled set
//! - [`CaptureScheduler`]: Primary and metrics tickers, deadline and drain
//! - [`SessionHandle`]: Cancellation, state and the finished [`CaptureSession`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vault_debug::collector::{CaptureScheduler, VaultClient, VaultConfig};
//! use vault_debug::config::{CaptureConfig, Limits, normalize};
//! use vault_debug::storage::Bundle;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(VaultClient::new(VaultConfig::new("http://127.0.0.1:8200"))?);
//! let session = normalize(&CaptureConfig::default(), &Limits::default())?.config;
//! let bundle = Bundle::prepare(None, chrono::Utc::now())?;
//! let handle = CaptureScheduler::new(session, client, bundle.sink()).start()?;
//! let _session = handle.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod http;
mod round;
mod scheduler;
mod target;
mod traits;

pub use http::{VaultClient, VaultConfig};
pub use round::{GOROUTINE_FILE, HEAP_FILE, PROFILE_FILE, TRACE_FILE};
pub use scheduler::{
    CaptureScheduler, CaptureSession, Progress, RoundCounts, RoundFamily, SchedulerState,
    SessionHandle, preflight,
};
pub use target::{CaptureTarget, TargetSet};
pub use traits::{CaptureClient, CaptureError, HealthStatus, SealStatus};
