//! Vault HTTP API client.
//!
//! Issues the individual capture requests over the Vault HTTP API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::collector::{CaptureClient, CaptureError, HealthStatus, SealStatus};

/// Default Vault address.
const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

/// Header carrying the client token.
const TOKEN_HEADER: &str = "X-Vault-Token";

/// Header carrying the namespace.
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Status code the health endpoint is asked to use for every node state, so
/// standby, sealed and secondary nodes still return a decodable body.
const HEALTH_OVERRIDE_CODE: &str = "299";

/// Maximum number of body bytes kept in a status error.
const ERROR_BODY_LIMIT: usize = 512;

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

/// Connection settings for the Vault server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Server address (default: https://127.0.0.1:8200).
    #[serde(default = "default_address")]
    pub address: String,
    /// Client token.
    #[serde(default)]
    pub token: Option<String>,
    /// Enterprise namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub tls_skip_verify: bool,
    /// Transport timeout per request. Must exceed the primary interval when
    /// profiling is enabled, since profile and trace requests block for it.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            token: None,
            namespace: None,
            tls_skip_verify: false,
            timeout: None,
        }
    }
}

impl VaultConfig {
    /// Create a configuration for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Set the client token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set TLS verification skipping.
    pub fn with_tls_skip_verify(mut self, skip: bool) -> Self {
        self.tls_skip_verify = skip;
        self
    }
}

/// [`CaptureClient`] backed by the Vault HTTP API.
pub struct VaultClient {
    config: VaultConfig,
    base: String,
    client: Client,
}

impl VaultClient {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns `CaptureError::Config` if the address is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: VaultConfig) -> Result<Self, CaptureError> {
        url::Url::parse(&config.address).map_err(|e| {
            CaptureError::Config(format!("invalid address '{}': {}", config.address, e))
        })?;

        let mut builder = Client::builder().danger_accept_invalid_certs(config.tls_skip_verify);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CaptureError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base = config.address.trim_end_matches('/').to_string();
        Ok(Self {
            config,
            base,
            client,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some(token) = &self.config.token {
            request = request.header(TOKEN_HEADER, token.as_str());
        }
        if let Some(namespace) = &self.config.namespace {
            request = request.header(NAMESPACE_HEADER, namespace.as_str());
        }
        request
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Vec<u8>, CaptureError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let body = text.chars().take(ERROR_BODY_LIMIT).collect();
            tracing::debug!(path, status = status.as_u16(), "Vault request rejected");
            return Err(CaptureError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body.to_vec())
    }

    async fn get_raw(&self, path: &str) -> Result<Vec<u8>, CaptureError> {
        self.send(path, self.get(path)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CaptureError> {
        let body = self.get_raw(path).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_sampled(&self, path: &str, seconds: u64) -> Result<Vec<u8>, CaptureError> {
        let request = self.get(path).query(&[("seconds", seconds.to_string())]);
        self.send(path, request).await
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.config.address)
            .field("namespace", &self.config.namespace)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl CaptureClient for VaultClient {
    fn address(&self) -> &str {
        &self.config.address
    }

    async fn check_health(&self) -> Result<HealthStatus, CaptureError> {
        let path = "/v1/sys/health";
        let request = self.get(path).query(&[
            ("uninitcode", HEALTH_OVERRIDE_CODE),
            ("sealedcode", HEALTH_OVERRIDE_CODE),
            ("standbycode", HEALTH_OVERRIDE_CODE),
            ("drsecondarycode", HEALTH_OVERRIDE_CODE),
            ("performancestandbycode", HEALTH_OVERRIDE_CODE),
        ]);
        let body = self.send(path, request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn check_seal_status(&self) -> Result<SealStatus, CaptureError> {
        self.get_json("/v1/sys/seal-status").await
    }

    async fn capture_goroutine(&self) -> Result<Vec<u8>, CaptureError> {
        self.get_raw("/v1/sys/pprof/goroutine").await
    }

    async fn capture_heap(&self) -> Result<Vec<u8>, CaptureError> {
        self.get_raw("/v1/sys/pprof/heap").await
    }

    async fn capture_profile(&self, seconds: u64) -> Result<Vec<u8>, CaptureError> {
        self.get_sampled("/v1/sys/pprof/profile", seconds).await
    }

    async fn capture_trace(&self, seconds: u64) -> Result<Vec<u8>, CaptureError> {
        self.get_sampled("/v1/sys/pprof/trace", seconds).await
    }

    async fn fetch_metrics(&self) -> Result<serde_json::Value, CaptureError> {
        self.get_json("/v1/sys/metrics").await
    }

    async fn fetch_host_info(&self) -> Result<serde_json::Value, CaptureError> {
        self.get_json("/v1/sys/host-info").await
    }

    async fn fetch_replication_status(&self) -> Result<serde_json::Value, CaptureError> {
        self.get_json("/v1/sys/replication/status").await
    }

    async fn fetch_config_state(&self) -> Result<serde_json::Value, CaptureError> {
        self.get_json("/v1/sys/config/state/sanitized").await
    }
}
