//! Configuration module for vault-debug.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Vault connection settings (address, token, namespace)
//! - Capture settings (duration, intervals, targets, output)
//! - Normalization of raw timing into an immutable [`SessionConfig`]

mod app;
mod normalize;
mod validation;

pub use app::{AppConfig, CaptureConfig};
pub use normalize::{Adjustment, Limits, Normalized, SessionConfig, normalize};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_DURATION, DEFAULT_INTERVAL, DEFAULT_MAX_IN_FLIGHT_ROUNDS, DEFAULT_METRICS_INTERVAL,
};
pub use normalize::{DURATION_GRACE, MIN_INTERVAL, REDACTED};
