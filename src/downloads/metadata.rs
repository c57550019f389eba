//! Bounded wait for transfer metadata.

use std::fmt;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::engine::{FileManifest, TransferHandle};

pub const METADATA_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, PartialEq, Eq)]
pub struct MetadataTimeout;

impl fmt::Display for MetadataTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timeout waiting for transfer metadata")
    }
}

impl std::error::Error for MetadataTimeout {}

/// Poll the handle until its file manifest is known or `deadline` elapses.
///
/// File selection and renaming are impossible before the manifest exists,
/// so this is the one blocking wait in the core. It holds no locks and has
/// no side effects on failure; on timeout the caller is responsible for
/// releasing the engine handle.
pub async fn await_metadata(
    handle: &dyn TransferHandle,
    deadline: Duration,
) -> Result<FileManifest, MetadataTimeout> {
    let poll = async {
        loop {
            if handle.has_metadata() {
                if let Some(manifest) = handle.manifest() {
                    return manifest;
                }
            }
            sleep(METADATA_POLL_INTERVAL).await;
        }
    };
    timeout(deadline, poll).await.map_err(|_| MetadataTimeout)
}
