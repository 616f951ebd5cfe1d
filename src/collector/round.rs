//! Work performed by a single capture round.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::collector::{CaptureClient, CaptureError, CaptureTarget};
use crate::config::SessionConfig;
use crate::storage::{
    ArtifactSink, CONFIG_FILE, ErrorRecord, ResultWriter, ServerStatusEntry, TimedEntry,
};

pub const GOROUTINE_FILE: &str = "goroutine.prof";
pub const HEAP_FILE: &str = "heap.prof";
pub const PROFILE_FILE: &str = "profile.prof";
pub const TRACE_FILE: &str = "trace.out";

/// Session time base.
///
/// Wall-clock timestamps are derived from the tokio clock so they stay
/// monotonic and consistent with the tickers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionClock {
    wall: DateTime<Utc>,
    start: Instant,
    deadline: Instant,
}

impl SessionClock {
    pub fn start(wall: DateTime<Utc>, deadline_offset: Duration) -> Self {
        let start = Instant::now();
        Self {
            wall,
            start,
            deadline: start + deadline_offset,
        }
    }

    pub fn started(&self) -> Instant {
        self.start
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wall-clock time of `instant`.
    pub fn at(&self, instant: Instant) -> DateTime<Utc> {
        let elapsed = instant.saturating_duration_since(self.start);
        self.wall + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.at(Instant::now())
    }

    /// Time left before the deadline, measured from `instant`.
    pub fn remaining_from(&self, instant: Instant) -> Duration {
        self.deadline.saturating_duration_since(instant)
    }
}

/// Everything a round task needs, shared by all rounds of a session.
///
/// Each context holds a sender of the error channel; the channel closes once
/// the last round drops its context.
pub(crate) struct RoundContext<C: CaptureClient> {
    pub client: Arc<C>,
    pub sink: Arc<dyn ArtifactSink>,
    pub writer: ResultWriter,
    pub errors: mpsc::Sender<ErrorRecord>,
    pub config: Arc<SessionConfig>,
    pub clock: SessionClock,
}

impl<C: CaptureClient> RoundContext<C> {
    /// Record a failed capture attempt.
    async fn report(&self, target: &str, err: &(dyn Display + Sync)) {
        tracing::warn!(capture = %target, error = %err, "Capture failed");
        let record = ErrorRecord::new(target, err, self.clock.now());
        if self.errors.send(record).await.is_err() {
            tracing::warn!(capture = %target, "Error log closed, record dropped");
        }
    }

    /// Write a snapshot into a round directory and index it.
    async fn store_snapshot(
        &self,
        round: &str,
        target: &str,
        file: &str,
        result: Result<Vec<u8>, CaptureError>,
    ) {
        let data = match result {
            Ok(data) => data,
            Err(e) => return self.report(target, &e).await,
        };
        if let Err(e) = self.sink.write(Some(round), file, &data).await {
            return self.report(target, &e).await;
        }
        if let Err(e) = self.writer.record_file(Some(round), file).await {
            tracing::warn!(round = %round, file, error = %e, "Failed to index snapshot");
            return;
        }
        tracing::debug!(round = %round, file, bytes = data.len(), "Snapshot written");
    }

    /// Whether a sample of length `sample` started now ends by the deadline.
    fn fits_before_deadline(&self, round: &str, what: &str, sample: Duration) -> bool {
        let remaining = self.clock.remaining_from(Instant::now());
        if remaining >= sample {
            return true;
        }
        tracing::info!(
            round = %round,
            snapshot = what,
            remaining = %humantime::format_duration(remaining),
            "Skipping snapshot, not enough time left in the session"
        );
        false
    }
}

/// Run one primary round: profiling snapshots plus status targets.
pub(crate) async fn run_primary_round<C: CaptureClient>(
    ctx: Arc<RoundContext<C>>,
    seq: u64,
    started: Instant,
) {
    let targets = &ctx.config.targets;
    let mut tasks = JoinSet::new();

    let round = match ctx.writer.register_round(ctx.clock.at(started)).await {
        Ok(name) => Some(name),
        Err(e) => {
            tracing::error!(round = seq, error = %e, "Failed to register round");
            None
        }
    };
    let round = match round {
        Some(name) => match ctx.sink.create_round_dir(&name).await {
            Ok(()) => Some(name),
            Err(e) => {
                if let Err(e) = ctx.writer.discard_round(name.as_str()).await {
                    tracing::warn!(round = seq, error = %e, "Failed to discard round");
                }
                if targets.contains(CaptureTarget::Pprof) {
                    ctx.report(CaptureTarget::Pprof.name(), &e).await;
                }
                None
            }
        },
        None => None,
    };

    if let Some(name) = round.filter(|_| targets.contains(CaptureTarget::Pprof)) {
        tasks.spawn(capture_pprof(Arc::clone(&ctx), name));
    }
    if targets.contains(CaptureTarget::ServerStatus) {
        tasks.spawn(capture_server_status(Arc::clone(&ctx), seq, started));
    }
    if targets.contains(CaptureTarget::Host) {
        tasks.spawn(capture_host_info(Arc::clone(&ctx), seq, started));
    }
    if targets.contains(CaptureTarget::ReplicationStatus) {
        tasks.spawn(capture_replication_status(Arc::clone(&ctx), seq, started));
    }
    drop(ctx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(round = seq, error = %e, "Capture task failed");
        }
    }
    tracing::debug!(round = seq, "Primary round complete");
}

async fn capture_pprof<C: CaptureClient>(ctx: Arc<RoundContext<C>>, round: String) {
    let (goroutine, heap) = tokio::join!(ctx.client.capture_goroutine(), ctx.client.capture_heap());
    tokio::join!(
        ctx.store_snapshot(&round, "pprof.goroutine", GOROUTINE_FILE, goroutine),
        ctx.store_snapshot(&round, "pprof.heap", HEAP_FILE, heap),
    );

    // Profile and trace sample for the whole interval and never overlap.
    // Each must finish before the deadline.
    let seconds = ctx.config.interval.as_secs().max(1);
    let sample = Duration::from_secs(seconds);

    if !ctx.fits_before_deadline(&round, "profile", sample) {
        return;
    }
    let profile = ctx.client.capture_profile(seconds).await;
    ctx.store_snapshot(&round, "pprof.profile", PROFILE_FILE, profile)
        .await;

    if !ctx.fits_before_deadline(&round, "trace", sample) {
        return;
    }
    let trace = ctx.client.capture_trace(seconds).await;
    ctx.store_snapshot(&round, "pprof.trace", TRACE_FILE, trace).await;
}

async fn capture_server_status<C: CaptureClient>(ctx: Arc<RoundContext<C>>, seq: u64, started: Instant) {
    let (health, seal) = tokio::join!(ctx.client.check_health(), ctx.client.check_seal_status());

    let health = match health {
        Ok(h) => Some(h),
        Err(e) => {
            ctx.report("server-status.health", &e).await;
            None
        }
    };
    let seal = match seal {
        Ok(s) => Some(s),
        Err(e) => {
            ctx.report("server-status.seal", &e).await;
            None
        }
    };

    let entry = ServerStatusEntry {
        timestamp: ctx.clock.at(started),
        health,
        seal,
    };
    if let Err(e) = ctx.writer.push_server_status(seq, entry).await {
        tracing::warn!(round = seq, error = %e, "Failed to store server status");
    }
}

async fn capture_host_info<C: CaptureClient>(ctx: Arc<RoundContext<C>>, seq: u64, started: Instant) {
    let data = match ctx.client.fetch_host_info().await {
        Ok(data) => data,
        Err(e) => return ctx.report(CaptureTarget::Host.name(), &e).await,
    };
    let entry = TimedEntry {
        timestamp: ctx.clock.at(started),
        data,
    };
    if let Err(e) = ctx.writer.push_host_info(seq, entry).await {
        tracing::warn!(round = seq, error = %e, "Failed to store host info");
    }
}

async fn capture_replication_status<C: CaptureClient>(
    ctx: Arc<RoundContext<C>>,
    seq: u64,
    started: Instant,
) {
    let data = match ctx.client.fetch_replication_status().await {
        Ok(data) => data,
        Err(e) => {
            return ctx.report(CaptureTarget::ReplicationStatus.name(), &e).await;
        }
    };
    let entry = TimedEntry {
        timestamp: ctx.clock.at(started),
        data,
    };
    if let Err(e) = ctx.writer.push_replication_status(seq, entry).await {
        tracing::warn!(round = seq, error = %e, "Failed to store replication status");
    }
}

/// Run one metrics round.
///
/// Nodes that forward metrics requests to the active node are skipped
/// without recording an error.
pub(crate) async fn run_metrics_round<C: CaptureClient>(ctx: Arc<RoundContext<C>>, seq: u64) {
    let target = CaptureTarget::Metrics.name();

    let health = match ctx.client.check_health().await {
        Ok(health) => health,
        Err(e) => return ctx.report(target, &e).await,
    };
    if let Some(reason) = health.metrics_skip_reason() {
        tracing::info!(round = seq, reason, "Skipping metrics round");
        return;
    }

    match ctx.client.fetch_metrics().await {
        Ok(value) => {
            if let Err(e) = ctx.writer.push_metrics(seq, value).await {
                tracing::warn!(round = seq, error = %e, "Failed to store metrics");
            } else {
                tracing::debug!(round = seq, "Metrics captured");
            }
        }
        Err(e) => ctx.report(target, &e).await,
    }
}

/// Capture the sanitized server configuration once per session.
pub(crate) async fn capture_config<C: CaptureClient>(ctx: Arc<RoundContext<C>>) {
    let target = CaptureTarget::Config.name();

    let data = match ctx.client.fetch_config_state().await {
        Ok(value) => serde_json::to_vec_pretty(&value),
        Err(e) => return ctx.report(target, &e).await,
    };
    let data = match data {
        Ok(data) => data,
        Err(e) => return ctx.report(target, &e).await,
    };
    if let Err(e) = ctx.sink.write(None, CONFIG_FILE, &data).await {
        return ctx.report(target, &e).await;
    }
    if let Err(e) = ctx.writer.record_file(None, CONFIG_FILE).await {
        tracing::warn!(file = CONFIG_FILE, error = %e, "Failed to index config");
        return;
    }
    tracing::debug!(file = CONFIG_FILE, "Configuration captured");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemorySink, MockClient};

    #[tokio::test(start_paused = true)]
    async fn test_clock_derives_wall_time_from_tokio_clock() {
        let wall = Utc::now();
        let clock = SessionClock::start(wall, Duration::from_secs(121));

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(clock.now(), wall + chrono::Duration::seconds(30));
        assert_eq!(clock.remaining_from(Instant::now()), Duration::from_secs(91));
        assert_eq!(
            clock.remaining_from(clock.deadline() + Duration::from_secs(5)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_capture_failure_is_recorded() {
        let (writer, handle) = ResultWriter::spawn(16);
        let (errors, mut rx) = mpsc::channel(4);
        let config = crate::config::normalize(
            &crate::config::CaptureConfig::default(),
            &crate::config::Limits::default(),
        )
        .unwrap()
        .config;
        let ctx = Arc::new(RoundContext {
            client: Arc::new(MockClient::new().failing("config")),
            sink: Arc::new(MemorySink::new()),
            writer: writer.clone(),
            errors,
            config: Arc::new(config),
            clock: SessionClock::start(Utc::now(), Duration::from_secs(121)),
        });

        capture_config(ctx).await;

        let record = rx.recv().await.unwrap();
        assert_eq!(record.target, "config");
        // The context is gone, so the channel is closed.
        assert!(rx.recv().await.is_none());

        let acc = writer.finish().await.unwrap();
        handle.await.unwrap();
        assert!(acc.index.files.is_empty());
    }
}
