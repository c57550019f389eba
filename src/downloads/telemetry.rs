//! Derived progress metrics, recomputed from raw engine counters on each
//! poll.

use crate::engine::{RawTransferStatus, TransferHandle};
use crate::session::{DownloadSession, DownloadStatus, Telemetry};

const BYTES_PER_KIB: f64 = 1024.0;
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Compute a telemetry snapshot and cache it on the session.
///
/// Pure given its inputs aside from the cache write (and the display-name
/// refresh once the engine knows the real name), so concurrent polls need
/// no ordering between each other; last writer wins on the cache and every
/// caller gets its own return value.
pub fn compute(session: &mut DownloadSession, raw: RawTransferStatus) -> Telemetry {
    let elapsed_seconds = session.started_at.elapsed().as_secs();

    if let Some(error) = raw.error {
        let name = if raw.name.is_empty() {
            session.display_name.clone()
        } else {
            raw.name
        };
        let telemetry = Telemetry {
            status: DownloadStatus::Error,
            progress: raw.progress * 100.0,
            name,
            download_rate: 0.0,
            upload_rate: 0.0,
            num_seeds: 0,
            num_peers: 0,
            total_download: 0.0,
            total_upload: 0.0,
            total_size: 0.0,
            eta_seconds: 0,
            elapsed_seconds,
            error: Some(error),
        };
        session.status = DownloadStatus::Error;
        session.last_telemetry = telemetry.clone();
        return telemetry;
    }

    if !raw.name.is_empty() {
        session.display_name = raw.name.clone();
    }

    let effective_total = effective_total_size(session.handle.as_ref());
    let eta_seconds = if raw.download_rate > 0.0 && effective_total > 0 {
        let remaining = effective_total.saturating_sub(raw.total_download);
        (remaining as f64 / raw.download_rate).max(0.0) as u64
    } else {
        0
    };

    let status = derive_status(session.status, &raw, session.handle.has_metadata());
    let telemetry = Telemetry {
        status,
        progress: raw.progress * 100.0,
        name: session.display_name.clone(),
        download_rate: raw.download_rate / BYTES_PER_KIB,
        upload_rate: raw.upload_rate / BYTES_PER_KIB,
        num_seeds: raw.num_seeds,
        num_peers: raw.num_peers,
        total_download: raw.total_download as f64 / BYTES_PER_MIB,
        total_upload: raw.total_upload as f64 / BYTES_PER_MIB,
        total_size: effective_total as f64 / BYTES_PER_MIB,
        eta_seconds,
        elapsed_seconds,
        error: None,
    };
    session.status = status;
    session.last_telemetry = telemetry.clone();
    telemetry
}

fn derive_status(
    current: DownloadStatus,
    raw: &RawTransferStatus,
    has_metadata: bool,
) -> DownloadStatus {
    if raw.is_seeding && raw.progress >= 1.0 {
        DownloadStatus::Completed
    } else if current == DownloadStatus::Completed {
        // Completed never regresses; only downloading/seeding flip freely.
        DownloadStatus::Completed
    } else if raw.is_seeding {
        DownloadStatus::Seeding
    } else if !has_metadata {
        DownloadStatus::FetchingMetadata
    } else {
        DownloadStatus::Downloading
    }
}

/// Byte sum of the files the engine will actually fetch: those with a
/// nonzero priority. Falls back to the manifest total when the sum is zero
/// (manifest not yet known, or nothing explicitly enabled).
pub fn effective_total_size(handle: &dyn TransferHandle) -> u64 {
    let Some(manifest) = handle.manifest() else {
        return 0;
    };
    let selected: u64 = manifest
        .files
        .iter()
        .filter(|file| handle.file_priority(file.index).is_enabled())
        .map(|file| file.size)
        .sum();
    if selected == 0 {
        manifest.total_size
    } else {
        selected
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::engine::fake::{manifest_fixture, FakeHandle};
    use crate::engine::{FileEntry, FileManifest, FilePriority};

    fn session_with(handle: Arc<FakeHandle>) -> DownloadSession {
        DownloadSession::new(
            "id".to_string(),
            handle,
            PathBuf::from("/downloads"),
            "test".to_string(),
            None,
            false,
        )
    }

    fn big_manifest() -> FileManifest {
        FileManifest {
            name: "big".to_string(),
            total_size: 100_000_000,
            files: vec![FileEntry {
                index: 0,
                path: "big/payload.bin".to_string(),
                size: 100_000_000,
            }],
        }
    }

    #[test]
    fn eta_follows_remaining_bytes_over_rate() {
        let handle = FakeHandle::new(Some(big_manifest()));
        let mut session = session_with(handle);
        let telemetry = compute(
            &mut session,
            RawTransferStatus {
                name: "big".to_string(),
                progress: 0.5,
                download_rate: 1024.0,
                total_download: 50_000_000,
                ..Default::default()
            },
        );
        assert_eq!(telemetry.eta_seconds, 48_828);
        assert_eq!(telemetry.status, DownloadStatus::Downloading);
    }

    #[test]
    fn eta_is_zero_without_download_rate() {
        let handle = FakeHandle::new(Some(big_manifest()));
        let mut session = session_with(handle);
        let telemetry = compute(
            &mut session,
            RawTransferStatus {
                progress: 0.5,
                download_rate: 0.0,
                total_download: 50_000_000,
                ..Default::default()
            },
        );
        assert_eq!(telemetry.eta_seconds, 0);
    }

    #[test]
    fn eta_never_goes_negative() {
        // More downloaded than the selected set (the remainder came from
        // since-deselected files); the clamp keeps the ETA at zero.
        let handle = FakeHandle::new(Some(big_manifest()));
        let mut session = session_with(handle);
        let telemetry = compute(
            &mut session,
            RawTransferStatus {
                download_rate: 1024.0,
                total_download: 150_000_000,
                ..Default::default()
            },
        );
        assert_eq!(telemetry.eta_seconds, 0);
    }

    #[test]
    fn effective_size_counts_only_enabled_files() {
        let handle = FakeHandle::new(Some(manifest_fixture()));
        handle.set_file_priority(0, FilePriority::Skip).unwrap();
        handle.set_file_priority(1, FilePriority::Normal).unwrap();
        assert_eq!(effective_total_size(handle.as_ref()), 200);
    }

    #[test]
    fn effective_size_falls_back_to_manifest_total() {
        let handle = FakeHandle::new(Some(manifest_fixture()));
        handle.set_file_priority(0, FilePriority::Skip).unwrap();
        handle.set_file_priority(1, FilePriority::Skip).unwrap();
        assert_eq!(effective_total_size(handle.as_ref()), 300);
    }

    #[test]
    fn effective_size_is_zero_without_manifest() {
        let handle = FakeHandle::new(None);
        assert_eq!(effective_total_size(handle.as_ref()), 0);
    }

    #[test]
    fn seeding_at_full_progress_is_completed() {
        let handle = FakeHandle::new(Some(manifest_fixture()));
        let mut session = session_with(handle);
        let telemetry = compute(
            &mut session,
            RawTransferStatus {
                progress: 1.0,
                is_seeding: true,
                ..Default::default()
            },
        );
        assert_eq!(telemetry.status, DownloadStatus::Completed);
        assert_eq!(telemetry.progress, 100.0);
    }

    #[test]
    fn completed_status_does_not_regress() {
        let handle = FakeHandle::new(Some(manifest_fixture()));
        let mut session = session_with(handle);
        session.status = DownloadStatus::Completed;
        let telemetry = compute(&mut session, RawTransferStatus::default());
        assert_eq!(telemetry.status, DownloadStatus::Completed);
    }

    #[test]
    fn engine_error_marks_session_terminal_and_caches_snapshot() {
        let handle = FakeHandle::new(Some(manifest_fixture()));
        let mut session = session_with(handle);
        let telemetry = compute(
            &mut session,
            RawTransferStatus {
                progress: 0.25,
                error: Some("tracker rejected us".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(telemetry.status, DownloadStatus::Error);
        assert_eq!(telemetry.error.as_deref(), Some("tracker rejected us"));
        assert_eq!(session.status, DownloadStatus::Error);
        assert_eq!(session.last_telemetry.status, DownloadStatus::Error);
    }

    #[test]
    fn display_name_tracks_engine_reported_name() {
        let handle = FakeHandle::new(Some(manifest_fixture()));
        let mut session = session_with(handle);
        assert_eq!(session.display_name, "test");
        let telemetry = compute(
            &mut session,
            RawTransferStatus {
                name: "real-name".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(telemetry.name, "real-name");
        assert_eq!(session.display_name, "real-name");
    }
}
