//! Capture target vocabulary and the resolved target set.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::config::ConfigError;

/// A named capture target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum CaptureTarget {
    /// Sanitized server configuration, captured once per session.
    Config,
    /// Host information, polled on the primary interval.
    Host,
    /// Telemetry metrics, polled on the metrics interval.
    Metrics,
    /// Runtime profiling snapshots, polled on the primary interval.
    Pprof,
    /// Replication status, polled on the primary interval.
    ReplicationStatus,
    /// Health and seal status, polled on the primary interval.
    ServerStatus,
}

impl CaptureTarget {
    /// Targets captured when none are configured.
    pub const DEFAULTS: [CaptureTarget; 5] = [
        CaptureTarget::Config,
        CaptureTarget::Metrics,
        CaptureTarget::Pprof,
        CaptureTarget::ReplicationStatus,
        CaptureTarget::ServerStatus,
    ];

    /// Kebab-case name, as used on the command line and in error records.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Comma-separated list of every known target name.
    pub fn available() -> String {
        Self::iter()
            .map(|t| t.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The validated, de-duplicated set of enabled targets.
///
/// Keeps the order in which targets were configured so the bundle index
/// reflects the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetSet(Vec<CaptureTarget>);

impl TargetSet {
    /// Resolve raw target names against the known vocabulary.
    ///
    /// Each entry may itself be a comma-separated list. An empty input
    /// resolves to [`CaptureTarget::DEFAULTS`]; the returned flag reports
    /// whether that substitution happened.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownTarget`] for any unrecognised name.
    pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<(Self, bool), ConfigError> {
        let mut targets = Vec::new();
        for name in names
            .iter()
            .flat_map(|n| n.as_ref().split(','))
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            let target =
                CaptureTarget::from_str(name).map_err(|_| ConfigError::UnknownTarget {
                    name: name.to_owned(),
                    available: CaptureTarget::available(),
                })?;
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        if targets.is_empty() {
            return Ok((Self::defaults(), true));
        }
        Ok((Self(targets), false))
    }

    /// The default target set.
    pub fn defaults() -> Self {
        Self(CaptureTarget::DEFAULTS.to_vec())
    }

    /// Whether `target` is enabled for this session.
    pub fn contains(&self, target: CaptureTarget) -> bool {
        self.0.contains(&target)
    }

    /// Target names in configured order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|t| t.to_string()).collect()
    }
}

impl std::fmt::Display for TargetSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}
