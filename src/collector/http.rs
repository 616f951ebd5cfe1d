//! Vault HTTP transport.
//!
//! - [`VaultClient`]: [`crate::collector::CaptureClient`] over the Vault HTTP API

mod client;

pub use client::{VaultClient, VaultConfig};
