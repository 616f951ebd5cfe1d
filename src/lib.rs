//! Vault Debug - Time-boxed Diagnostics Capture
//!
//! This crate provides the core functionality for capturing a debug bundle
//! from a Vault server. It can be used as a library by other Rust projects, or
//! run as a standalone binary with the `vault-debug` executable.
//!
//! # Architecture
//!
//! - **Config**: YAML/CLI settings normalized into an immutable session config
//! - **Collector**: Interval scheduler fanning capture rounds out to the server
//! - **Storage**: Single-writer result accumulator and bundle persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vault_debug::{CaptureScheduler, VaultClient, VaultConfig};
//! use vault_debug::config::{CaptureConfig, Limits, normalize};
//! use vault_debug::storage::{Bundle, write_bundle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(VaultClient::new(VaultConfig::new("http://127.0.0.1:8200"))?);
//!     let config = normalize(&CaptureConfig::default(), &Limits::default())?.config;
//!     let bundle = Bundle::prepare(None, chrono::Utc::now())?;
//!
//!     let handle = CaptureScheduler::new(config, client, bundle.sink()).start()?;
//!     let session = handle.wait().await?;
//!     write_bundle(bundle.sink().as_ref(), &session, bundle.is_compressed()).await?;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::{
    CaptureClient, CaptureError, CaptureScheduler, CaptureSession, CaptureTarget, SessionHandle,
    VaultClient, VaultConfig,
};
pub use config::{AppConfig, ConfigError, SessionConfig};
pub use storage::{ResultWriter, StorageError};
