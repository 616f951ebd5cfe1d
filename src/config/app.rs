//! Application configuration structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::http::VaultConfig;

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default total capture duration (2 minutes).
pub const DEFAULT_DURATION: Duration = Duration::from_secs(120);

/// Default primary interval for profiling and status capture (30 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Default metrics interval (10 seconds).
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Default cap on concurrently running rounds per trigger.
pub const DEFAULT_MAX_IN_FLIGHT_ROUNDS: usize = 4;

fn default_duration() -> Duration {
    DEFAULT_DURATION
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_metrics_interval() -> Duration {
    DEFAULT_METRICS_INTERVAL
}

fn default_max_in_flight_rounds() -> usize {
    DEFAULT_MAX_IN_FLIGHT_ROUNDS
}

fn default_compress() -> bool {
    true
}

// =============================================================================
// Capture Configuration
// =============================================================================

/// Raw capture settings as written by the user.
///
/// These are not yet normalized; see [`super::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Total capture duration (default: 2m).
    #[serde(default = "default_duration", with = "humantime_serde")]
    pub duration: Duration,

    /// Profiling and server state interval (default: 30s).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Metrics interval (default: 10s).
    #[serde(default = "default_metrics_interval", with = "humantime_serde")]
    pub metrics_interval: Duration,

    /// Targets to capture. Empty means the default set.
    #[serde(default)]
    pub targets: Vec<String>,

    /// Output directory. Defaults to `vault-debug-<timestamp>`.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Pack the bundle into a `.tar.gz` archive (default: true).
    #[serde(default = "default_compress")]
    pub compress: bool,

    /// Maximum rounds of one trigger running at the same time (default: 4).
    #[serde(default = "default_max_in_flight_rounds")]
    pub max_in_flight_rounds: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            interval: DEFAULT_INTERVAL,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
            targets: Vec::new(),
            output: None,
            compress: true,
            max_in_flight_rounds: DEFAULT_MAX_IN_FLIGHT_ROUNDS,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Connection to the Vault server.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Capture timing and targets.
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` references in the token are expanded from the environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    /// Returns `ConfigError` if the text cannot be parsed or validated.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.vault.token = config.vault.token.map(|t| expand_env_vars(&t));
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.vault.address).map_err(|e| {
            ConfigError::ValidationError(format!(
                "invalid vault address '{}': {}",
                self.vault.address, e
            ))
        })?;

        if self.capture.max_in_flight_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "capture max_in_flight_rounds must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
