//! Interval scheduler driving a bounded capture session.
//!
//! One control task owns both tickers, the deadline and the error log.
//! Rounds run as spawned tasks tracked by a [`TaskTracker`]; each trigger
//! family has its own semaphore capping the rounds in flight. When the
//! deadline passes or the session is cancelled the loop stops launching and
//! waits for every outstanding round before handing back the results.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::collector::round::{self, RoundContext, SessionClock};
use crate::collector::{CaptureClient, CaptureError, CaptureTarget, HealthStatus};
use crate::config::SessionConfig;
use crate::storage::{
    ArtifactIndex, ArtifactSink, DEFAULT_CHANNEL_CAPACITY, ErrorRecord, ResultWriter,
    ServerStatusEntry, TimedEntry,
};

/// Capacity of the channel carrying error records to the control loop.
const ERROR_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Draining,
    Terminated,
}

/// The two independently timed trigger families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RoundFamily {
    /// Profiling and status targets, on the primary interval.
    Primary,
    /// Metrics, on the metrics interval.
    Metrics,
}

/// Progress notification, sent each time a round is launched or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub family: RoundFamily,
    /// Ticks handled so far, launched or skipped.
    pub current: u64,
    pub total: u64,
    pub skipped: u64,
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "capturing {} ({}/{}", self.family, self.current, self.total)?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        f.write_str(")")
    }
}

/// Rounds launched and skipped per family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoundCounts {
    pub primary_started: u64,
    pub primary_skipped: u64,
    pub metrics_started: u64,
    pub metrics_skipped: u64,
}

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub started_at: DateTime<Utc>,
    pub address: String,
    pub config: SessionConfig,
    /// Failed capture attempts in arrival order.
    pub errors: Vec<ErrorRecord>,
    pub index: ArtifactIndex,
    pub server_status: Vec<ServerStatusEntry>,
    pub metrics: Vec<serde_json::Value>,
    pub host_info: Vec<TimedEntry>,
    pub replication_status: Vec<TimedEntry>,
    pub rounds: RoundCounts,
    /// Whether the session ended on cancellation rather than the deadline.
    pub cancelled: bool,
}

/// Verify the server answers before any round starts.
///
/// # Errors
/// Any failure is reported as [`CaptureError::Config`].
pub async fn preflight<C: CaptureClient + ?Sized>(client: &C) -> Result<HealthStatus, CaptureError> {
    client.check_health().await.map_err(|e| {
        CaptureError::Config(format!(
            "unable to connect to the server at {}: {e}",
            client.address()
        ))
    })
}

/// Bounded-duration polling scheduler for one capture session.
pub struct CaptureScheduler<C: CaptureClient> {
    config: Arc<SessionConfig>,
    client: Arc<C>,
    sink: Arc<dyn ArtifactSink>,
    progress: Option<mpsc::UnboundedSender<Progress>>,
    state: watch::Sender<SchedulerState>,
}

impl<C: CaptureClient> std::fmt::Debug for CaptureScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureScheduler")
            .field("address", &self.client.address())
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<C: CaptureClient> CaptureScheduler<C> {
    pub fn new(config: SessionConfig, client: Arc<C>, sink: Arc<dyn ArtifactSink>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            config: Arc::new(config),
            client,
            sink,
            progress: None,
            state,
        }
    }

    /// Send a [`Progress`] notification for every launched or skipped round.
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Watch the scheduler state.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Check the invariants a normalized configuration guarantees.
    pub fn validate(&self) -> Result<(), CaptureError> {
        let c = &self.config;
        if c.interval.is_zero() || c.metrics_interval.is_zero() {
            return Err(CaptureError::Config("intervals must be positive".to_string()));
        }
        if c.interval > c.duration || c.metrics_interval > c.duration {
            return Err(CaptureError::Config(
                "intervals must not exceed the duration".to_string(),
            ));
        }
        if c.max_in_flight_rounds == 0 {
            return Err(CaptureError::Config(
                "max_in_flight_rounds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and start the session in a background task.
    pub fn start(self) -> Result<SessionHandle, CaptureError> {
        self.validate()?;
        let cancel = CancellationToken::new();
        let state = self.subscribe();
        let task = tokio::spawn(self.run(cancel.clone()));
        Ok(SessionHandle {
            cancel,
            state,
            task,
        })
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
        tracing::debug!(state = %state, "Scheduler state changed");
    }

    /// Run the session to completion on the current task.
    ///
    /// Returns once the deadline has passed or `cancel` fired, and every
    /// round already launched has finished.
    pub async fn run(self, cancel: CancellationToken) -> Result<CaptureSession, CaptureError> {
        self.validate()?;

        let started_at = Utc::now();
        let clock = SessionClock::start(started_at, self.config.deadline_offset());
        let (writer, accumulator) = ResultWriter::spawn(DEFAULT_CHANNEL_CAPACITY);
        let (errors_tx, mut errors_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        let ctx = Arc::new(RoundContext {
            client: Arc::clone(&self.client),
            sink: Arc::clone(&self.sink),
            writer: writer.clone(),
            errors: errors_tx,
            config: Arc::clone(&self.config),
            clock,
        });

        let targets = &self.config.targets;
        let primary_enabled = [
            CaptureTarget::Pprof,
            CaptureTarget::ServerStatus,
            CaptureTarget::Host,
            CaptureTarget::ReplicationStatus,
        ]
        .into_iter()
        .any(|t| targets.contains(t));
        let metrics_enabled = targets.contains(CaptureTarget::Metrics);

        let tracker = TaskTracker::new();
        let mut launcher = Launcher::new(&self.config, tracker.clone(), self.progress.clone());

        self.set_state(SchedulerState::Running);
        tracing::info!(
            address = %self.client.address(),
            duration = %humantime::format_duration(self.config.duration),
            interval = %humantime::format_duration(self.config.interval),
            metrics_interval = %humantime::format_duration(self.config.metrics_interval),
            targets = %targets,
            "Capture session started"
        );

        if targets.contains(CaptureTarget::Config) {
            tracker.spawn(round::capture_config(Arc::clone(&ctx)));
        }

        // The first tick of each interval completes immediately, so both
        // families run a round at session start.
        let mut primary = tokio::time::interval_at(clock.started(), self.config.interval);
        primary.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut metrics = tokio::time::interval_at(clock.started(), self.config.metrics_interval);
        metrics.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = tokio::time::sleep_until(clock.deadline());
        tokio::pin!(deadline);

        let mut errors = Vec::new();
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Capture session cancelled");
                    cancelled = true;
                    break;
                }
                _ = &mut deadline => {
                    tracing::info!("Capture duration reached");
                    break;
                }
                Some(record) = errors_rx.recv() => errors.push(record),
                _ = primary.tick(), if primary_enabled => launcher.launch_primary(&ctx),
                _ = metrics.tick(), if metrics_enabled => launcher.launch_metrics(&ctx),
            }
        }

        self.set_state(SchedulerState::Draining);
        tracker.close();
        drop(ctx);

        // Closes once the last round drops its context.
        while let Some(record) = errors_rx.recv().await {
            errors.push(record);
        }
        tracker.wait().await;

        let accumulated = writer.finish().await?;
        accumulator
            .await
            .map_err(|e| CaptureError::Scheduler(e.to_string()))?;

        let rounds = launcher.counts;
        self.set_state(SchedulerState::Terminated);
        tracing::info!(
            primary_rounds = rounds.primary_started,
            metrics_rounds = rounds.metrics_started,
            skipped = rounds.primary_skipped + rounds.metrics_skipped,
            errors = errors.len(),
            "Capture session finished"
        );

        Ok(CaptureSession {
            started_at,
            address: self.client.address().to_owned(),
            config: (*self.config).clone(),
            errors,
            index: accumulated.index,
            server_status: accumulated.server_status,
            metrics: accumulated.metrics,
            host_info: accumulated.host_info,
            replication_status: accumulated.replication_status,
            rounds,
            cancelled,
        })
    }
}

/// Spawns rounds for the control loop without ever blocking it.
struct Launcher {
    tracker: TaskTracker,
    primary_permits: Arc<Semaphore>,
    metrics_permits: Arc<Semaphore>,
    primary_total: u64,
    metrics_total: u64,
    progress: Option<mpsc::UnboundedSender<Progress>>,
    counts: RoundCounts,
}

impl Launcher {
    fn new(
        config: &SessionConfig,
        tracker: TaskTracker,
        progress: Option<mpsc::UnboundedSender<Progress>>,
    ) -> Self {
        Self {
            tracker,
            primary_permits: Arc::new(Semaphore::new(config.max_in_flight_rounds)),
            metrics_permits: Arc::new(Semaphore::new(config.max_in_flight_rounds)),
            primary_total: config.primary_rounds(),
            metrics_total: config.metrics_rounds(),
            progress,
            counts: RoundCounts::default(),
        }
    }

    fn launch_primary<C: CaptureClient>(&mut self, ctx: &Arc<RoundContext<C>>) {
        let Ok(permit) = Arc::clone(&self.primary_permits).try_acquire_owned() else {
            self.counts.primary_skipped += 1;
            tracing::warn!(family = %RoundFamily::Primary, "Too many rounds in flight, round skipped");
            self.notify(RoundFamily::Primary);
            return;
        };
        self.counts.primary_started += 1;
        let seq = self.counts.primary_started;
        self.notify(RoundFamily::Primary);

        let ctx = Arc::clone(ctx);
        let started = Instant::now();
        self.tracker.spawn(async move {
            round::run_primary_round(ctx, seq, started).await;
            drop(permit);
        });
    }

    fn launch_metrics<C: CaptureClient>(&mut self, ctx: &Arc<RoundContext<C>>) {
        let Ok(permit) = Arc::clone(&self.metrics_permits).try_acquire_owned() else {
            self.counts.metrics_skipped += 1;
            tracing::warn!(family = %RoundFamily::Metrics, "Too many rounds in flight, round skipped");
            self.notify(RoundFamily::Metrics);
            return;
        };
        self.counts.metrics_started += 1;
        let seq = self.counts.metrics_started;
        self.notify(RoundFamily::Metrics);

        let ctx = Arc::clone(ctx);
        self.tracker.spawn(async move {
            round::run_metrics_round(ctx, seq).await;
            drop(permit);
        });
    }

    fn notify(&self, family: RoundFamily) {
        let (started, skipped, total) = match family {
            RoundFamily::Primary => (
                self.counts.primary_started,
                self.counts.primary_skipped,
                self.primary_total,
            ),
            RoundFamily::Metrics => (
                self.counts.metrics_started,
                self.counts.metrics_skipped,
                self.metrics_total,
            ),
        };
        let progress = Progress {
            family,
            current: started + skipped,
            total,
            skipped,
        };
        tracing::debug!(family = %family, round = progress.current, total, skipped, "Round tick handled");
        if let Some(tx) = &self.progress {
            // The receiver going away only silences progress output.
            let _ = tx.send(progress);
        }
    }
}

/// Handle to a running session.
#[derive(Debug)]
pub struct SessionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    task: JoinHandle<Result<CaptureSession, CaptureError>>,
}

impl SessionHandle {
    /// Stop launching rounds. Rounds in flight still finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels the session when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Wait for the session to terminate.
    pub async fn wait(self) -> Result<CaptureSession, CaptureError> {
        self.task
            .await
            .map_err(|e| CaptureError::Scheduler(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::collector::round::{GOROUTINE_FILE, HEAP_FILE, PROFILE_FILE, TRACE_FILE};
    use crate::config::{CaptureConfig, Limits, normalize};
    use crate::storage::CONFIG_FILE;
    use crate::testing::{MemorySink, MockClient};

    fn session_config(duration: u64, interval: u64, metrics: u64, targets: &[&str]) -> SessionConfig {
        let raw = CaptureConfig {
            duration: Duration::from_secs(duration),
            interval: Duration::from_secs(interval),
            metrics_interval: Duration::from_secs(metrics),
            targets: targets.iter().map(|t| t.to_string()).collect(),
            ..CaptureConfig::default()
        };
        normalize(&raw, &Limits::default()).unwrap().config
    }

    fn scheduler(
        config: SessionConfig,
        client: MockClient,
    ) -> (CaptureScheduler<MockClient>, Arc<MockClient>, Arc<MemorySink>) {
        let client = Arc::new(client);
        let sink = Arc::new(MemorySink::new());
        let scheduler = CaptureScheduler::new(config, Arc::clone(&client), sink.clone());
        (scheduler, client, sink)
    }

    fn errors_for<'a>(session: &'a CaptureSession, target: &str) -> Vec<&'a ErrorRecord> {
        session.errors.iter().filter(|e| e.target == target).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_counts_follow_duration_and_intervals() {
        let config = session_config(120, 30, 10, &[]);
        let (scheduler, _client, sink) = scheduler(config, MockClient::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = scheduler
            .with_progress(tx)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.rounds.primary_started, 5);
        assert_eq!(session.rounds.metrics_started, 13);
        assert_eq!(session.rounds.primary_skipped, 0);
        assert_eq!(session.server_status.len(), 5);
        assert_eq!(session.metrics.len(), 13);
        assert_eq!(session.replication_status.len(), 5);
        assert!(session.host_info.is_empty());
        assert!(session.errors.is_empty());
        assert!(!session.cancelled);

        assert_eq!(session.index.rounds.len(), 5);
        assert_eq!(session.index.files, vec![CONFIG_FILE]);
        assert!(sink.file(CONFIG_FILE).is_some());

        // Timelines follow round initiation.
        let stamps: Vec<_> = session.server_status.iter().map(|s| s.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));

        let mut progress = Vec::new();
        while let Ok(p) = rx.try_recv() {
            progress.push(p);
        }
        let last_primary = progress
            .iter()
            .filter(|p| p.family == RoundFamily::Primary)
            .last()
            .unwrap();
        assert_eq!(last_primary.to_string(), "capturing primary (5/5)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heap_failure_recorded_per_round() {
        let config = session_config(5, 5, 5, &["pprof"]);
        let (scheduler, _client, sink) = scheduler(config, MockClient::new().failing("heap"));

        let session = scheduler.run(CancellationToken::new()).await.unwrap();

        let started = session.rounds.primary_started;
        assert_eq!(started, 2);
        let heap_errors = errors_for(&session, "pprof.heap");
        assert_eq!(heap_errors.len() as u64, started);
        assert!(heap_errors.iter().all(|e| e.timestamp >= session.started_at));

        assert_eq!(sink.dirs().len(), 2);
        for (name, round) in &session.index.rounds {
            assert!(round.files.iter().any(|f| f == GOROUTINE_FILE));
            assert!(!round.files.iter().any(|f| f == HEAP_FILE));
            assert!(sink.file(&format!("{name}/{GOROUTINE_FILE}")).is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_skipped_on_dr_secondary() {
        let health = HealthStatus {
            initialized: true,
            replication_dr_mode: Some("secondary".to_string()),
            ..HealthStatus::default()
        };
        let config = session_config(30, 10, 10, &["metrics"]);
        let (scheduler, client, _sink) = scheduler(config, MockClient::new().with_health(health));

        let session = scheduler.run(CancellationToken::new()).await.unwrap();

        assert_eq!(session.rounds.metrics_started, 4);
        assert!(session.metrics.is_empty());
        assert!(session.errors.is_empty());
        assert!(client.calls("metrics").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_skipped_on_standby() {
        let health = HealthStatus {
            initialized: true,
            standby: true,
            ..HealthStatus::default()
        };
        let config = session_config(30, 10, 10, &["metrics"]);
        let (scheduler, _client, _sink) = scheduler(config, MockClient::new().with_health(health));

        let session = scheduler.run(CancellationToken::new()).await.unwrap();

        assert!(session.metrics.is_empty());
        assert!(session.errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_failure_recorded() {
        let config = session_config(10, 10, 5, &["metrics"]);
        let (scheduler, _client, _sink) = scheduler(config, MockClient::new().failing("metrics"));

        let session = scheduler.run(CancellationToken::new()).await.unwrap();

        assert_eq!(session.rounds.metrics_started, 3);
        assert_eq!(errors_for(&session, "metrics").len(), 3);
        assert!(session.metrics.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_and_trace_never_overlap() {
        let config = session_config(20, 10, 10, &["pprof"]);
        let (scheduler, client, _sink) = scheduler(config, MockClient::new());

        scheduler.run(CancellationToken::new()).await.unwrap();

        // Round 0 samples both; round 10 has time for its profile only.
        let profiles = client.calls("profile");
        let traces = client.calls("trace");
        assert_eq!(profiles.len(), 2);
        assert_eq!(traces.len(), 1);
        assert!(profiles[0].end - profiles[0].start >= Duration::from_secs(10));
        assert!(traces[0].start >= profiles[0].end);
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_and_trace_omitted_when_time_runs_short() {
        let config = session_config(120, 30, 10, &["pprof"]);
        let (scheduler, _client, _sink) = scheduler(config, MockClient::new());

        let session = scheduler.run(CancellationToken::new()).await.unwrap();

        let rounds: Vec<_> = session.index.rounds.values().collect();
        assert_eq!(rounds.len(), 5);
        let has = |files: &[String], f: &str| files.iter().any(|x| x == f);

        for round in &rounds[..3] {
            assert!(has(&round.files, PROFILE_FILE));
            assert!(has(&round.files, TRACE_FILE));
        }
        // t=90: the profile ends at 120, a trace would end past the deadline.
        assert!(has(&rounds[3].files, PROFILE_FILE));
        assert!(!has(&rounds[3].files, TRACE_FILE));

        let last = &rounds[4].files;
        assert!(has(last, GOROUTINE_FILE));
        assert!(has(last, HEAP_FILE));
        assert!(!has(last, PROFILE_FILE));
        assert!(!has(last, TRACE_FILE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampling_finishes_within_deadline() {
        let config = session_config(120, 30, 10, &["pprof"]);
        let deadline = Instant::now() + config.deadline_offset();
        let (scheduler, client, _sink) = scheduler(config, MockClient::new());

        scheduler.run(CancellationToken::new()).await.unwrap();

        assert!(Instant::now() <= deadline);
        let sampled: Vec<_> = client
            .calls("profile")
            .into_iter()
            .chain(client.calls("trace"))
            .collect();
        assert_eq!(sampled.len(), 7);
        assert!(sampled.iter().all(|c| c.end <= deadline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_new_rounds_and_keeps_in_flight() {
        let config = session_config(120, 30, 10, &["pprof", "server-status"]);
        let (scheduler, _client, _sink) = scheduler(config, MockClient::new());
        let handle = scheduler.start().unwrap();
        let mut state = handle.subscribe();

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(handle.state(), SchedulerState::Running);
        handle.cancel();

        let session = handle.wait().await.unwrap();
        assert!(session.cancelled);
        assert_eq!(session.rounds.primary_started, 2);
        assert_eq!(session.server_status.len(), 2);
        assert_eq!(*state.borrow_and_update(), SchedulerState::Terminated);

        // The round started at t=30 was still profiling when cancelled.
        let second = session.index.rounds.values().nth(1).unwrap();
        assert!(second.files.iter().any(|f| f == PROFILE_FILE));
        assert!(second.files.iter().any(|f| f == TRACE_FILE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_skipped_when_cap_reached() {
        let mut config = session_config(60, 10, 10, &["pprof"]);
        config.max_in_flight_rounds = 1;
        let client = MockClient::new().with_delay("heap", Duration::from_secs(25));
        let (scheduler, _client, _sink) = scheduler(config, client);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = scheduler
            .with_progress(tx)
            .run(CancellationToken::new())
            .await
            .unwrap();

        // Rounds at t=0 and t=50 run; the ticks while one is in flight are dropped.
        assert_eq!(session.rounds.primary_started, 2);
        assert_eq!(session.rounds.primary_skipped, 5);
        assert_eq!(session.index.rounds.len(), 2);

        // Skipped ticks still advance progress to the expected total.
        let mut last = None;
        while let Ok(p) = rx.try_recv() {
            last = Some(p);
        }
        let last = last.unwrap();
        assert_eq!((last.current, last.total, last.skipped), (7, 7, 5));
        assert_eq!(last.to_string(), "capturing primary (7/7, 5 skipped)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_dir_failure_discards_round() {
        let config = session_config(10, 5, 5, &["pprof", "server-status"]);
        let client = Arc::new(MockClient::new());
        let sink = Arc::new(MemorySink::new().failing_round_dirs());
        let scheduler = CaptureScheduler::new(config, Arc::clone(&client), sink.clone());

        let session = scheduler.run(CancellationToken::new()).await.unwrap();

        let started = session.rounds.primary_started;
        assert_eq!(started, 3);
        assert_eq!(errors_for(&session, "pprof").len() as u64, started);
        assert!(session.index.rounds.is_empty());
        assert!(client.calls("goroutine").is_empty());
        // Status targets of the same round still run.
        assert_eq!(session.server_status.len() as u64, started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_status_failure_keeps_entry() {
        let config = session_config(5, 5, 5, &["server-status"]);
        let (scheduler, _client, _sink) = scheduler(config, MockClient::new().failing("seal"));

        let session = scheduler.run(CancellationToken::new()).await.unwrap();

        assert_eq!(session.server_status.len(), 2);
        assert!(session.server_status.iter().all(|s| s.health.is_some() && s.seal.is_none()));
        assert_eq!(errors_for(&session, "server-status.seal").len(), 2);
        assert!(errors_for(&session, "server-status.health").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_start() {
        let mut config = session_config(60, 10, 10, &["pprof"]);
        config.interval = Duration::from_secs(90);
        let (scheduler, client, _sink) = scheduler(config, MockClient::new());

        assert!(matches!(scheduler.start(), Err(CaptureError::Config(_))));
        assert!(client.calls("goroutine").is_empty());
    }

    #[tokio::test]
    async fn test_preflight_maps_failure_to_config_error() {
        let client = MockClient::new().failing("health");
        let err = preflight(&client).await.unwrap_err();
        match err {
            CaptureError::Config(msg) => assert!(msg.contains("unable to connect")),
            other => panic!("expected config error, got {other:?}"),
        }

        assert!(preflight(&MockClient::new()).await.is_ok());
    }
}
