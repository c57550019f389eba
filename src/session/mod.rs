//! The tracked unit of work: one managed download session.

pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::engine::TransferHandle;

/// Session state. Transitions are monotone except `Downloading ⇄ Seeding`,
/// which is recomputed from engine state on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    FetchingMetadata,
    Downloading,
    Seeding,
    Completed,
    Error,
    Cancelled,
}

impl DownloadStatus {
    /// Terminal states are evicted lazily: the poll after the one that
    /// first observed them, so a final status read is always possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Error | DownloadStatus::Cancelled)
    }
}

/// Derived snapshot returned on each poll. Rates are KiB/s, byte totals
/// are MiB, matching what the reference API reports.
#[derive(Debug, Clone, Serialize)]
pub struct Telemetry {
    pub status: DownloadStatus,
    pub progress: f64,
    pub name: String,
    pub download_rate: f64,
    pub upload_rate: f64,
    pub num_seeds: u32,
    pub num_peers: u32,
    pub total_download: f64,
    pub total_upload: f64,
    pub total_size: f64,
    pub eta_seconds: u64,
    pub elapsed_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Telemetry {
    /// Initial snapshot cached at session creation, before the first poll.
    pub fn placeholder(status: DownloadStatus, name: &str) -> Self {
        Self {
            status,
            progress: 0.0,
            name: name.to_string(),
            download_rate: 0.0,
            upload_rate: 0.0,
            num_seeds: 0,
            num_peers: 0,
            total_download: 0.0,
            total_upload: 0.0,
            total_size: 0.0,
            eta_seconds: 0,
            elapsed_seconds: 0,
            error: None,
        }
    }
}

/// Display name used until transfer metadata arrives.
pub const PENDING_NAME: &str = "Fetching metadata...";

pub struct DownloadSession {
    pub id: String,
    pub status: DownloadStatus,
    pub handle: Arc<dyn TransferHandle>,
    pub internal_path: PathBuf,
    pub display_name: String,
    /// Set once at creation, never mutated.
    pub started_at: Instant,
    pub last_telemetry: Telemetry,
    pub selection: Option<Vec<usize>>,
    pub flatten_top_dir: bool,
}

impl std::fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSession")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("handle", &"<dyn TransferHandle>")
            .field("internal_path", &self.internal_path)
            .field("display_name", &self.display_name)
            .field("started_at", &self.started_at)
            .field("last_telemetry", &self.last_telemetry)
            .field("selection", &self.selection)
            .field("flatten_top_dir", &self.flatten_top_dir)
            .finish()
    }
}

impl DownloadSession {
    pub fn new(
        id: String,
        handle: Arc<dyn TransferHandle>,
        internal_path: PathBuf,
        display_name: String,
        selection: Option<Vec<usize>>,
        flatten_top_dir: bool,
    ) -> Self {
        let status = if handle.has_metadata() {
            DownloadStatus::Downloading
        } else {
            DownloadStatus::FetchingMetadata
        };
        Self {
            id,
            status,
            handle,
            internal_path,
            last_telemetry: Telemetry::placeholder(status, &display_name),
            display_name,
            started_at: Instant::now(),
            selection,
            flatten_top_dir,
        }
    }
}
