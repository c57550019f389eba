//! Opaque seam to the external transfer engine.
//!
//! The engine performs the actual peer-to-peer exchange; this crate only
//! needs the handle surface below: add, status, per-file priority and
//! rename, metadata availability, and removal.

pub mod adapter;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

/// How a transfer is described when handed to the engine.
#[derive(Debug, Clone)]
pub enum TransferSource {
    /// Magnet URI to resolve via the swarm.
    Magnet(String),
    /// Raw bencoded metainfo (an uploaded `.torrent` file).
    Metainfo(Vec<u8>),
}

impl TransferSource {
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::Magnet(uri.into())
    }

    pub fn metainfo(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Metainfo(bytes.into())
    }

    /// The bytes that identify this transfer's content, used for
    /// deterministic session ids.
    pub fn descriptor_bytes(&self) -> &[u8] {
        match self {
            Self::Magnet(uri) => uri.as_bytes(),
            Self::Metainfo(bytes) => bytes,
        }
    }
}

/// Engine-level per-file fetch flag. `Skip` is the zero priority; `Normal`
/// is any nonzero value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePriority {
    Skip,
    Normal,
}

impl FilePriority {
    pub fn is_enabled(self) -> bool {
        matches!(self, FilePriority::Normal)
    }
}

/// One constituent file discovered from transfer metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub index: usize,
    #[serde(rename = "name")]
    pub path: String,
    pub size: u64,
}

/// The file list known once transfer metadata is available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileManifest {
    pub name: String,
    pub total_size: u64,
    pub files: Vec<FileEntry>,
}

impl FileManifest {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Raw counters reported by the engine on each status read. Rates are
/// bytes per second, totals are bytes, progress is a 0..1 fraction.
#[derive(Debug, Clone, Default)]
pub struct RawTransferStatus {
    pub name: String,
    pub progress: f64,
    pub download_rate: f64,
    pub upload_rate: f64,
    pub num_seeds: u32,
    pub num_peers: u32,
    pub total_download: u64,
    pub total_upload: u64,
    pub is_seeding: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum EngineError {
    /// The descriptor could not be parsed or added.
    InvalidDescriptor(String),
    /// The engine refused an operation on a live handle.
    Rejected(String),
    /// No engine is available to service the request.
    Unavailable(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidDescriptor(msg) => write!(f, "invalid transfer descriptor: {msg}"),
            EngineError::Rejected(msg) => write!(f, "engine rejected operation: {msg}"),
            EngineError::Unavailable(msg) => write!(f, "transfer engine unavailable: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Options for admitting a transfer into the engine.
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub save_path: PathBuf,
    /// Fetch metadata only; no payload data is downloaded. Used for
    /// manifest inspection.
    pub metadata_only: bool,
}

/// Engine-side reference to one in-progress transfer.
///
/// Status reads are safe to issue concurrently; mutations
/// (priority/rename/remove) are serialized per handle by the caller.
pub trait TransferHandle: Send + Sync {
    fn is_valid(&self) -> bool;
    fn has_metadata(&self) -> bool;
    /// `None` until metadata is available.
    fn manifest(&self) -> Option<FileManifest>;
    fn status(&self) -> RawTransferStatus;
    fn file_priority(&self, index: usize) -> FilePriority;
    fn set_file_priority(&self, index: usize, priority: FilePriority) -> Result<(), EngineError>;
    fn rename_file(&self, index: usize, new_path: &str) -> Result<(), EngineError>;
    /// Remove the transfer from the engine. The handle is invalid
    /// afterwards; `delete_files` also discards downloaded data.
    fn remove(&self, delete_files: bool) -> Result<(), EngineError>;
}

#[async_trait]
pub trait TransferEngine: Send + Sync + 'static {
    async fn add_transfer(
        &self,
        source: &TransferSource,
        options: AddOptions,
    ) -> Result<Arc<dyn TransferHandle>, EngineError>;

    /// Parse raw metainfo into a manifest without admitting a transfer.
    fn parse_metainfo(&self, bytes: &[u8]) -> Result<FileManifest, EngineError>;
}
