//! Storage Layer
//!
//! Result accumulation and bundle persistence:
//! - **Accumulator**: single actor task owning every result collection and the
//!   artifact index, fed over a tokio mpsc channel
//! - **Sink**: where per-round snapshots and session files are written
//!
//! # Components
//!
//! - [`ResultWriter`]: Cloneable write facade over the accumulator channel
//! - [`ArtifactSink`] / [`DirectorySink`]: Atomic file writes into the bundle
//! - [`Bundle`] / [`write_bundle`]: Output directory setup and finalization
//! - [`compress_dir`]: Optional `.tar.gz` packing of the finished bundle

mod actor;
mod archive;
mod bundle;
mod error;
mod facades;
mod sink;
mod types;

pub use actor::Accumulated;
pub use archive::{ARCHIVE_EXT, archive_paths, compress_dir};
pub use bundle::{
    Bundle, CONFIG_FILE, DEFAULT_OUTPUT_PREFIX, HOST_INFO_FILE, INDEX_FILE, METRICS_FILE,
    REPLICATION_STATUS_FILE, SERVER_STATUS_FILE, write_bundle,
};
pub use error::StorageError;
pub use facades::{DEFAULT_CHANNEL_CAPACITY, ResultWriter};
pub use sink::{ArtifactSink, DirectorySink};
pub use types::{
    ArtifactIndex, DebugIndex, ErrorRecord, INDEX_VERSION, ROUND_DIR_FORMAT, RoundArtifacts,
    ServerStatusEntry, TimedEntry, round_dir_name,
};
