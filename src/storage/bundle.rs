//! Bundle output directory and session-end serialization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collector::{CaptureSession, CaptureTarget};
use crate::storage::StorageError;
use crate::storage::archive::{archive_paths, compress_dir};
use crate::storage::sink::{ArtifactSink, DirectorySink};
use crate::storage::types::{ArtifactIndex, DebugIndex, INDEX_VERSION, ROUND_DIR_FORMAT};

pub const INDEX_FILE: &str = "index.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const SERVER_STATUS_FILE: &str = "server-status.json";
pub const HOST_INFO_FILE: &str = "host_info.json";
pub const REPLICATION_STATUS_FILE: &str = "replication_status.json";
pub const CONFIG_FILE: &str = "config.json";

/// Prefix of the output directory when none is configured.
pub const DEFAULT_OUTPUT_PREFIX: &str = "vault-debug-";

/// A freshly created bundle directory, optionally packed into an archive
/// once the session is written.
#[derive(Debug, Clone)]
pub struct Bundle {
    sink: Arc<DirectorySink>,
    archive: Option<PathBuf>,
}

impl Bundle {
    /// Default output directory name for a session started at `now`.
    pub fn default_output(now: DateTime<Utc>) -> PathBuf {
        PathBuf::from(format!(
            "{DEFAULT_OUTPUT_PREFIX}{}",
            now.format(ROUND_DIR_FORMAT)
        ))
    }

    /// Create the output directory.
    ///
    /// # Errors
    /// [`StorageError::OutputExists`] if anything already exists at the
    /// location, or [`StorageError::Io`] if it cannot be created.
    pub fn prepare(output: Option<&Path>, now: DateTime<Utc>) -> Result<Self, StorageError> {
        let root = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::default_output(now));

        if root.exists() {
            return Err(StorageError::OutputExists(root));
        }
        std::fs::create_dir_all(&root)?;

        tracing::debug!(path = %root.display(), "Bundle directory created");
        Ok(Self {
            sink: Arc::new(DirectorySink::new(root)),
            archive: None,
        })
    }

    /// Create the working directory of a bundle that ends up as `.tar.gz`.
    ///
    /// An output ending in `.tar.gz` or `.tgz` names the archive and the
    /// directory is the name without the extension.
    ///
    /// # Errors
    /// [`StorageError::OutputExists`] if the archive or the directory already
    /// exists.
    pub fn prepare_compressed(
        output: Option<&Path>,
        now: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        let requested = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::default_output(now));
        let (root, archive) = archive_paths(&requested);
        if archive.exists() {
            return Err(StorageError::OutputExists(archive));
        }

        let mut bundle = Self::prepare(Some(&root), now)?;
        bundle.archive = Some(archive);
        Ok(bundle)
    }

    pub fn root(&self) -> &Path {
        self.sink.root()
    }

    pub fn sink(&self) -> Arc<DirectorySink> {
        Arc::clone(&self.sink)
    }

    /// Archive path, when the bundle is compressed.
    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }

    pub fn is_compressed(&self) -> bool {
        self.archive.is_some()
    }

    /// Pack the directory into the archive and return where the bundle now
    /// lives. Without compression this is the directory itself.
    ///
    /// # Errors
    /// On failure the directory is left in place.
    pub async fn compress(&self) -> Result<PathBuf, StorageError> {
        let Some(archive) = self.archive.clone() else {
            return Ok(self.root().to_path_buf());
        };
        let dir = self.root().to_path_buf();
        let dst = archive.clone();
        tokio::task::spawn_blocking(move || compress_dir(&dir, &dst))
            .await
            .map_err(|e| StorageError::Archive(e.to_string()))??;
        Ok(archive)
    }
}

/// Serialize the session collections and the index document.
///
/// Each collection is written on its own; a failed one is left out of the
/// index and does not stop the others. Files already written are kept.
///
/// `compress` is recorded in the index; packing is done by
/// [`Bundle::compress`].
///
/// # Errors
/// [`StorageError::Finalize`] naming every file that could not be written.
pub async fn write_bundle(
    sink: &dyn ArtifactSink,
    session: &CaptureSession,
    compress: bool,
) -> Result<DebugIndex, StorageError> {
    let mut output = session.index.clone();
    let mut failures = Vec::new();

    write_collection(sink, METRICS_FILE, &session.metrics, &mut output, &mut failures).await;
    write_collection(
        sink,
        SERVER_STATUS_FILE,
        &session.server_status,
        &mut output,
        &mut failures,
    )
    .await;
    if session.config.targets.contains(CaptureTarget::Host) {
        write_collection(sink, HOST_INFO_FILE, &session.host_info, &mut output, &mut failures)
            .await;
    }
    if session.config.targets.contains(CaptureTarget::ReplicationStatus) {
        write_collection(
            sink,
            REPLICATION_STATUS_FILE,
            &session.replication_status,
            &mut output,
            &mut failures,
        )
        .await;
    }

    let index = DebugIndex {
        vault_address: session.address.clone(),
        version: INDEX_VERSION,
        client_version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: session.started_at,
        duration_seconds: session.config.duration.as_secs(),
        interval_seconds: session.config.interval.as_secs(),
        metrics_interval_seconds: session.config.metrics_interval.as_secs(),
        raw_args: session.config.raw_args.clone(),
        targets: session.config.targets.names(),
        compress,
        output,
        errors: session.errors.clone(),
    };

    let written = match serde_json::to_vec_pretty(&index) {
        Ok(data) => sink.write(None, INDEX_FILE, &data).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = written {
        tracing::error!(file = INDEX_FILE, error = %e, "Failed to write index");
        failures.push(format!("{INDEX_FILE}: {e}"));
    }

    if failures.is_empty() {
        Ok(index)
    } else {
        Err(StorageError::Finalize(failures.join("; ")))
    }
}

async fn write_collection<T>(
    sink: &dyn ArtifactSink,
    file: &'static str,
    items: &[T],
    output: &mut ArtifactIndex,
    failures: &mut Vec<String>,
) where
    T: Serialize + Sync,
{
    let written = match serde_json::to_vec_pretty(items) {
        Ok(data) => sink.write(None, file, &data).await,
        Err(e) => Err(e.into()),
    };
    match written {
        Ok(()) => {
            output.record_file(None, file);
            tracing::debug!(file, entries = items.len(), "Collection written");
        }
        Err(e) => {
            tracing::error!(file, error = %e, "Failed to write collection");
            failures.push(format!("{file}: {e}"));
        }
    }
}
