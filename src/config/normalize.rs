//! Normalization of raw capture timing into an immutable session configuration.
//!
//! Raw values are never mutated in place: [`normalize`] returns the corrected
//! [`SessionConfig`] together with every [`Adjustment`] that was applied so the
//! caller can report them.

use std::time::Duration;

use crate::collector::TargetSet;

use super::app::CaptureConfig;
use super::validation::ConfigError;

/// Minimum accepted value for the duration and both intervals.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Extra time added to the duration so a tick landing exactly on the
/// duration boundary still runs its round.
pub const DURATION_GRACE: Duration = Duration::from_secs(1);

/// Flags whose values are never recorded in the bundle index.
const SECRET_FLAGS: [&str; 1] = ["token"];

/// Replacement for a secret flag value.
pub const REDACTED: &str = "<redacted>";

/// Timing limits applied during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Floor for duration, interval and metrics interval.
    pub min_interval: Duration,
    /// Grace period added to the session deadline.
    pub grace: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_interval: MIN_INTERVAL,
            grace: DURATION_GRACE,
        }
    }
}

/// A non-fatal correction applied to the raw configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
    DurationRaised { from: Duration, to: Duration },
    IntervalRaised { from: Duration, to: Duration },
    IntervalLowered { from: Duration, to: Duration },
    MetricsIntervalRaised { from: Duration, to: Duration },
    MetricsIntervalLowered { from: Duration, to: Duration },
    DefaultTargets,
}

impl std::fmt::Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = humantime::format_duration;
        match self {
            Self::DurationRaised { from, to } => write!(
                f,
                "overwriting duration value {} to the minimum value of {}",
                h(*from),
                h(*to)
            ),
            Self::IntervalRaised { from, to } => write!(
                f,
                "overwriting interval value {} to the minimum value of {}",
                h(*from),
                h(*to)
            ),
            Self::IntervalLowered { from, to } => write!(
                f,
                "overwriting interval value {} to the duration value {}",
                h(*from),
                h(*to)
            ),
            Self::MetricsIntervalRaised { from, to } => write!(
                f,
                "overwriting metrics interval value {} to the minimum value of {}",
                h(*from),
                h(*to)
            ),
            Self::MetricsIntervalLowered { from, to } => write!(
                f,
                "overwriting metrics interval value {} to the duration value {}",
                h(*from),
                h(*to)
            ),
            Self::DefaultTargets => write!(f, "no targets given, using the default target set"),
        }
    }
}

/// Normalized, internally consistent configuration of one capture session.
///
/// Guarantees `min_interval <= interval <= duration` and the same for
/// `metrics_interval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub duration: Duration,
    pub interval: Duration,
    pub metrics_interval: Duration,
    pub grace: Duration,
    pub targets: TargetSet,
    /// Cap on concurrently running rounds, per trigger.
    pub max_in_flight_rounds: usize,
    /// Arguments the session was invoked with, recorded in the bundle index.
    pub raw_args: Vec<String>,
}

impl SessionConfig {
    /// Offset from session start at which the control loop stops.
    pub fn deadline_offset(&self) -> Duration {
        self.duration + self.grace
    }

    /// Expected number of primary rounds, including the one at t=0.
    pub fn primary_rounds(&self) -> u64 {
        rounds_within(self.duration, self.interval)
    }

    /// Expected number of metrics rounds, including the one at t=0.
    pub fn metrics_rounds(&self) -> u64 {
        rounds_within(self.duration, self.metrics_interval)
    }

    /// Attach the raw invocation arguments.
    ///
    /// Values of secret flags (`--token s.x`, `--token=s.x`, `-token=s.x`)
    /// are replaced with [`REDACTED`].
    pub fn with_raw_args(mut self, args: Vec<String>) -> Self {
        self.raw_args = redact_args(args);
        self
    }
}

fn redact_args(args: Vec<String>) -> Vec<String> {
    let mut redact_next = false;
    args.into_iter()
        .map(|arg| {
            if std::mem::take(&mut redact_next) {
                return REDACTED.to_owned();
            }
            let flag = arg.trim_start_matches('-');
            if flag.len() == arg.len() {
                return arg;
            }
            match flag.split_once('=') {
                Some((name, _)) if SECRET_FLAGS.contains(&name) => {
                    let end = arg.len() - flag.len() + name.len();
                    format!("{}={REDACTED}", &arg[..end])
                }
                None if SECRET_FLAGS.contains(&flag) => {
                    redact_next = true;
                    arg
                }
                _ => arg,
            }
        })
        .collect()
}

fn rounds_within(duration: Duration, interval: Duration) -> u64 {
    let ticks = duration.as_nanos() / interval.as_nanos().max(1);
    u64::try_from(ticks).unwrap_or(u64::MAX).saturating_add(1)
}

/// Result of [`normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub config: SessionConfig,
    pub adjustments: Vec<Adjustment>,
}

/// Clamp raw capture settings and resolve targets.
///
/// # Errors
/// Returns [`ConfigError`] for unknown target names or a zero round cap.
pub fn normalize(raw: &CaptureConfig, limits: &Limits) -> Result<Normalized, ConfigError> {
    if raw.max_in_flight_rounds == 0 {
        return Err(ConfigError::ValidationError(
            "capture max_in_flight_rounds must be positive".to_string(),
        ));
    }

    let mut adjustments = Vec::new();

    let mut duration = raw.duration;
    if duration < limits.min_interval {
        adjustments.push(Adjustment::DurationRaised {
            from: duration,
            to: limits.min_interval,
        });
        duration = limits.min_interval;
    }

    let interval = clamp_interval(
        raw.interval,
        limits.min_interval,
        duration,
        &mut adjustments,
        |from, to| Adjustment::IntervalRaised { from, to },
        |from, to| Adjustment::IntervalLowered { from, to },
    );
    let metrics_interval = clamp_interval(
        raw.metrics_interval,
        limits.min_interval,
        duration,
        &mut adjustments,
        |from, to| Adjustment::MetricsIntervalRaised { from, to },
        |from, to| Adjustment::MetricsIntervalLowered { from, to },
    );

    let (targets, defaulted) = TargetSet::resolve(&raw.targets)?;
    if defaulted {
        adjustments.push(Adjustment::DefaultTargets);
    }

    Ok(Normalized {
        config: SessionConfig {
            duration,
            interval,
            metrics_interval,
            grace: limits.grace,
            targets,
            max_in_flight_rounds: raw.max_in_flight_rounds,
            raw_args: Vec::new(),
        },
        adjustments,
    })
}

fn clamp_interval(
    value: Duration,
    floor: Duration,
    ceiling: Duration,
    adjustments: &mut Vec<Adjustment>,
    raised: impl Fn(Duration, Duration) -> Adjustment,
    lowered: impl Fn(Duration, Duration) -> Adjustment,
) -> Duration {
    let mut value = value;
    if value < floor {
        adjustments.push(raised(value, floor));
        value = floor;
    }
    if value > ceiling {
        adjustments.push(lowered(value, ceiling));
        value = ceiling;
    }
    value
}
