//! Artifact sinks: where captured files land.

use std::path::{Path, PathBuf};

use crate::storage::StorageError;

/// Destination for bundle files.
///
/// Files are addressed by an optional round directory and a file name.
/// A write is all-or-nothing: after a failed write the file is absent.
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync + 'static {
    /// Create the directory for a round.
    async fn create_round_dir(&self, round: &str) -> Result<(), StorageError>;

    /// Write `data` to `file`, inside `round` or at the bundle root.
    async fn write(&self, round: Option<&str>, file: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Sink writing into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Create a sink rooted at `root`. The directory must already exist.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Bundle root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, round: Option<&str>, file: &str) -> PathBuf {
        match round {
            Some(dir) => self.root.join(dir).join(file),
            None => self.root.join(file),
        }
    }
}

#[async_trait::async_trait]
impl ArtifactSink for DirectorySink {
    async fn create_round_dir(&self, round: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.root.join(round)).await?;
        Ok(())
    }

    async fn write(&self, round: Option<&str>, file: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(round, file);
        let tmp = path.with_file_name(format!(".{file}.tmp"));

        if let Err(e) = tokio::fs::write(&tmp, data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}
