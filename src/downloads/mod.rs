//! Download session orchestration: turning a raw engine handle into a
//! managed, queryable, cancellable session.

pub mod metadata;
pub mod selection;
pub mod telemetry;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::engine::{AddOptions, EngineError, FileManifest, TransferEngine, TransferSource};
use crate::sandbox::{PathSandbox, SandboxError};
use crate::session::registry::SessionRegistry;
use crate::session::{DownloadSession, DownloadStatus, Telemetry, PENDING_NAME};
use metadata::{await_metadata, MetadataTimeout};

#[derive(Debug)]
pub enum DownloadError {
    Sandbox(SandboxError),
    PathMissing(String),
    Duplicate(String),
    MetadataTimeout,
    Engine(EngineError),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::Sandbox(err) => err.fmt(f),
            DownloadError::PathMissing(path) => write!(f, "download path not found: {path}"),
            DownloadError::Duplicate(id) => {
                write!(f, "a download with id {id} is already active")
            }
            DownloadError::MetadataTimeout => {
                write!(f, "timeout waiting for torrent metadata")
            }
            DownloadError::Engine(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<SandboxError> for DownloadError {
    fn from(err: SandboxError) -> Self {
        DownloadError::Sandbox(err)
    }
}

impl From<EngineError> for DownloadError {
    fn from(err: EngineError) -> Self {
        DownloadError::Engine(err)
    }
}

impl From<MetadataTimeout> for DownloadError {
    fn from(_: MetadataTimeout) -> Self {
        DownloadError::MetadataTimeout
    }
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Deadline for the metadata wait on starts that need file selection
    /// and on magnet inspection.
    pub metadata_timeout: Duration,
    /// Save location for metadata-only inspection handles.
    pub scratch_dir: PathBuf,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(30),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Owns the engine collaborator, the sandbox, and the session registry.
pub struct DownloadManager {
    engine: Arc<dyn TransferEngine>,
    registry: SessionRegistry,
    sandbox: PathSandbox,
    settings: DownloadSettings,
}

impl DownloadManager {
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        sandbox: PathSandbox,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            engine,
            registry: SessionRegistry::new(),
            sandbox,
            settings,
        }
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Resolve a descriptor to its file manifest without starting a
    /// download. Magnet sources go through a metadata-only engine handle
    /// that is released before returning, success or not.
    pub async fn inspect(&self, source: &TransferSource) -> Result<FileManifest, DownloadError> {
        match source {
            TransferSource::Metainfo(bytes) => Ok(self.engine.parse_metainfo(bytes)?),
            TransferSource::Magnet(_) => {
                let handle = self
                    .engine
                    .add_transfer(
                        source,
                        AddOptions {
                            save_path: self.settings.scratch_dir.clone(),
                            metadata_only: true,
                        },
                    )
                    .await?;
                let result =
                    await_metadata(handle.as_ref(), self.settings.metadata_timeout).await;
                if let Err(err) = handle.remove(false) {
                    warn!(%err, "failed to release inspection handle");
                }
                Ok(result?)
            }
        }
    }

    /// Admit a transfer and register it as a managed session.
    ///
    /// The metadata wait only happens when the caller asked for file
    /// selection or layout flattening, which are impossible before the
    /// manifest is known; it blocks this request alone.
    pub async fn start(
        &self,
        source: TransferSource,
        virtual_path: &str,
        selection: Option<Vec<usize>>,
        flatten_top_dir: bool,
    ) -> Result<String, DownloadError> {
        let internal_path = self.sandbox.resolve(virtual_path)?;
        if !tokio::fs::try_exists(&internal_path).await.unwrap_or(false) {
            return Err(DownloadError::PathMissing(virtual_path.to_string()));
        }

        let id = derive_download_id(&source);
        if self.registry.contains(&id) {
            return Err(DownloadError::Duplicate(id));
        }

        let handle = self
            .engine
            .add_transfer(
                &source,
                AddOptions {
                    save_path: internal_path.clone(),
                    metadata_only: false,
                },
            )
            .await?;

        let needs_manifest = selection.is_some() || flatten_top_dir;
        let mut display_name = PENDING_NAME.to_string();
        if needs_manifest {
            let manifest =
                match await_metadata(handle.as_ref(), self.settings.metadata_timeout).await {
                    Ok(manifest) => manifest,
                    Err(MetadataTimeout) => {
                        if let Err(err) = handle.remove(false) {
                            warn!(%err, "failed to release handle after metadata timeout");
                        }
                        return Err(DownloadError::MetadataTimeout);
                    }
                };
            selection::apply_selection(
                handle.as_ref(),
                &manifest,
                selection.as_deref(),
                flatten_top_dir,
            );
            display_name = manifest.name;
        } else if let Some(manifest) = handle.manifest() {
            display_name = manifest.name;
        }

        let session = DownloadSession::new(
            id.clone(),
            handle,
            internal_path.clone(),
            display_name,
            selection,
            flatten_top_dir,
        );
        if let Err(lost) = self.registry.insert_new(session) {
            // Lost a race against an identical descriptor; the winner keeps
            // its handle, ours goes back to the engine.
            if let Err(err) = lost.handle.remove(false) {
                warn!(id = %lost.id, %err, "failed to release duplicate handle");
            }
            return Err(DownloadError::Duplicate(id));
        }

        info!(id = %id, path = %internal_path.display(), "download started");
        Ok(id)
    }

    /// Poll one session's telemetry. `None` means the id is unknown —
    /// including the poll after a terminal status was served.
    pub async fn progress(&self, id: &str) -> Option<Telemetry> {
        let entry = self.registry.get(id)?;
        let mut session = entry.lock().await;

        // Lazy eviction: a terminal status observed by an earlier poll is
        // served one final time before the session disappears.
        if session.status.is_terminal() {
            let last = session.last_telemetry.clone();
            drop(session);
            self.registry.remove(id);
            debug!(id, "evicted terminal session");
            return Some(last);
        }

        if !session.handle.is_valid() {
            session.status = DownloadStatus::Error;
            let mut last = session.last_telemetry.clone();
            last.status = DownloadStatus::Error;
            last.download_rate = 0.0;
            last.upload_rate = 0.0;
            last.eta_seconds = 0;
            last.error = Some("transfer was removed by the engine".to_string());
            session.last_telemetry = last.clone();
            return Some(last);
        }

        let raw = session.handle.status();
        Some(telemetry::compute(&mut session, raw))
    }

    /// Cancel a session: engine removal with delete-data semantics, then a
    /// best-effort sweep of residual files. The session is evicted
    /// unconditionally, even when either cleanup step fails.
    pub async fn cancel(&self, id: &str) -> Option<()> {
        let entry = self.registry.remove(id)?;
        let mut session = entry.lock().await;
        session.status = DownloadStatus::Cancelled;
        session.last_telemetry.status = DownloadStatus::Cancelled;

        let name = session
            .handle
            .manifest()
            .map(|manifest| manifest.name)
            .unwrap_or_else(|| session.display_name.clone());
        let residue = session.internal_path.join(&name);

        if let Err(err) = session.handle.remove(true) {
            warn!(id, %err, "engine removal failed during cancel");
        }
        drop(session);

        if name.is_empty() || name == PENDING_NAME {
            info!(id, "download cancelled");
            return Some(());
        }

        // Engine-level deletion can be partial or race in-flight writes;
        // sweep whatever is left on disk.
        if let Ok(meta) = tokio::fs::metadata(&residue).await {
            let result = if meta.is_dir() {
                tokio::fs::remove_dir_all(&residue).await
            } else {
                tokio::fs::remove_file(&residue).await
            };
            if let Err(err) = result {
                warn!(id, path = %residue.display(), %err, "failed to delete residual files");
            }
        }

        info!(id, "download cancelled");
        Some(())
    }

    /// Drop completed sessions from the registry (the media-library
    /// refresh path does this in the reference behavior).
    pub async fn evict_completed(&self) -> usize {
        let mut evicted = 0;
        for id in self.registry.ids_with_status(DownloadStatus::Completed) {
            if self.registry.remove(&id).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, "swept completed sessions");
        }
        evicted
    }
}

/// Deterministic session id: the first 16 hex chars of the descriptor's
/// sha256. Two transfers sharing a descriptor therefore collide; that is
/// surfaced as a conflict, never silently disambiguated.
pub fn derive_download_id(source: &TransferSource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.descriptor_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
