//! Vault Debug Binary Entry Point
//!
//! Captures a time-boxed debug bundle from a Vault server.
//! Core functionality is provided by the `vault_debug` library crate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault_debug::{
    collector::{CaptureScheduler, VaultClient, preflight},
    config::{AppConfig, Limits, normalize, parse_duration},
    storage::{Bundle, write_bundle},
};

/// Vault Debug - capture server diagnostics over a bounded session
#[derive(Parser, Debug)]
#[command(name = "vault-debug", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "VAULT_DEBUG_CONFIG")]
    config: Option<PathBuf>,

    /// Vault server address (overrides config file)
    #[arg(long, env = "VAULT_ADDR")]
    address: Option<String>,

    /// Client token (overrides config file)
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Namespace (overrides config file)
    #[arg(long, env = "VAULT_NAMESPACE")]
    namespace: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    tls_skip_verify: bool,

    /// Total capture duration, e.g. 2m
    #[arg(long, value_parser = parse_duration)]
    duration: Option<Duration>,

    /// Interval for profiling and server state capture, e.g. 30s
    #[arg(long, value_parser = parse_duration)]
    interval: Option<Duration>,

    /// Interval for metrics capture, e.g. 10s
    #[arg(long, value_parser = parse_duration)]
    metrics_interval: Option<Duration>,

    /// Targets to capture (comma separated)
    #[arg(long, value_delimiter = ',')]
    target: Vec<String>,

    /// Output location for the bundle
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the bundle as a plain directory instead of a .tar.gz archive
    #[arg(long)]
    no_compress: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vault_debug=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let cli = Cli::parse();

    // Load configuration from file
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(address) = cli.address {
        config.vault.address = address;
    }
    if let Some(token) = cli.token {
        config.vault.token = Some(token);
    }
    if let Some(namespace) = cli.namespace {
        config.vault.namespace = Some(namespace);
    }
    if cli.tls_skip_verify {
        config.vault.tls_skip_verify = true;
    }
    if let Some(duration) = cli.duration {
        config.capture.duration = duration;
    }
    if let Some(interval) = cli.interval {
        config.capture.interval = interval;
    }
    if let Some(metrics_interval) = cli.metrics_interval {
        config.capture.metrics_interval = metrics_interval;
    }
    if !cli.target.is_empty() {
        config.capture.targets = cli.target;
    }
    if let Some(output) = cli.output {
        config.capture.output = Some(output);
    }
    if cli.no_compress {
        config.capture.compress = false;
    }
    config.validate()?;

    let normalized = normalize(&config.capture, &Limits::default())?;
    for adjustment in &normalized.adjustments {
        tracing::warn!("{}", adjustment);
    }
    let session = normalized.config.with_raw_args(raw_args);

    // Connect and verify the server answers
    let client = Arc::new(VaultClient::new(config.vault.clone())?);
    let health = preflight(client.as_ref()).await?;
    if health.sealed {
        tracing::warn!("Vault server is sealed, most captures will fail");
    }

    let output = config.capture.output.as_deref();
    let bundle = if config.capture.compress {
        Bundle::prepare_compressed(output, chrono::Utc::now())?
    } else {
        Bundle::prepare(output, chrono::Utc::now())?
    };

    tracing::info!("Vault Address: {}", config.vault.address);
    tracing::info!("Output: {}", bundle.archive().unwrap_or(bundle.root()).display());
    tracing::info!(
        "Duration: {}, Interval: {}, Metrics Interval: {}",
        humantime::format_duration(session.duration),
        humantime::format_duration(session.interval),
        humantime::format_duration(session.metrics_interval),
    );
    tracing::info!("Targets: {}", session.targets);
    tracing::info!("Press Ctrl+C to stop early");

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            tracing::info!("{}", progress);
        }
    });

    let handle = CaptureScheduler::new(session, client, bundle.sink())
        .with_progress(progress_tx)
        .start()?;
    tokio::spawn(shutdown_signal(handle.cancellation_token()));

    let captured = handle.wait().await?;
    if let Err(e) = printer.await {
        tracing::warn!("Progress printer failed: {}", e);
    }

    // Persist collections and the index
    tracing::info!("Writing bundle...");
    let index = write_bundle(bundle.sink().as_ref(), &captured, bundle.is_compressed()).await;
    if !captured.errors.is_empty() {
        tracing::warn!(
            "{} capture errors recorded, see index.json",
            captured.errors.len()
        );
    }
    index?;

    let location = match bundle.compress().await {
        Ok(location) => location,
        Err(e) => {
            tracing::error!("Error encountered during bundle compression: {}", e);
            tracing::info!("Data written to: {}", bundle.root().display());
            return Err(e.into());
        }
    };

    tracing::info!("Success! Bundle written to: {}", location.display());
    Ok(())
}

/// Cancel the session on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Stopping capture, waiting for rounds in flight...");
    cancel.cancel();
}
