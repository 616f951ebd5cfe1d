//! Configuration validation utilities.

use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Configuration error types.
///
/// Every variant is fatal: the session aborts before any capture round starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),

    /// A capture target name outside the known vocabulary.
    #[error("unknown capture target '{name}' (available: {available})")]
    UnknownTarget { name: String, available: String },
}

/// Parse a capture duration.
///
/// A bare number is taken as seconds, the way the Vault CLI reads its
/// duration flags; anything else goes through humantime (`30s`, `2m`,
/// `1m30s`, `500ms`).
///
/// # Examples
///
/// ```
/// use vault_debug::config::parse_duration;
///
/// assert_eq!(parse_duration("30").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("2m").unwrap().as_secs(), 120);
/// assert_eq!(parse_duration("1m30s").unwrap().as_secs(), 90);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration is empty".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| format!("invalid duration '{s}': {e}"))
}

/// Expand `${VAR}` and `${VAR:-default}` references from the process
/// environment. Used for tokens kept out of the config file.
pub fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    let reference = REFERENCE.get_or_init(|| {
        Regex::new(r"\$\{(?<name>[A-Za-z_][A-Za-z0-9_]*)(?::-(?<default>[^}]*))?\}")
            .expect("env reference pattern is valid")
    });

    reference
        .replace_all(input, |caps: &Captures| {
            lookup(&caps["name"]).unwrap_or_else(|| {
                caps.name("default")
                    .map_or_else(String::new, |m| m.as_str().to_owned())
            })
        })
        .into_owned()
}
