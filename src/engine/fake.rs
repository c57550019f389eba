//! In-process engine doubles for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    AddOptions, EngineError, FileEntry, FileManifest, FilePriority, RawTransferStatus,
    TransferEngine, TransferHandle, TransferSource,
};

pub(crate) fn manifest_fixture() -> FileManifest {
    FileManifest {
        name: "a".to_string(),
        total_size: 300,
        files: vec![
            FileEntry {
                index: 0,
                path: "a/1.txt".to_string(),
                size: 100,
            },
            FileEntry {
                index: 1,
                path: "a/2.txt".to_string(),
                size: 200,
            },
        ],
    }
}

#[derive(Default)]
pub(crate) struct FakeHandle {
    valid: AtomicBool,
    metadata_ready: AtomicBool,
    manifest: Mutex<Option<FileManifest>>,
    status: Mutex<RawTransferStatus>,
    priorities: Mutex<HashMap<usize, FilePriority>>,
    renames: Mutex<HashMap<usize, String>>,
    removed: Mutex<Option<bool>>,
    failing_indices: Mutex<Vec<usize>>,
}

impl FakeHandle {
    pub(crate) fn new(manifest: Option<FileManifest>) -> Arc<Self> {
        let handle = Self {
            valid: AtomicBool::new(true),
            metadata_ready: AtomicBool::new(manifest.is_some()),
            manifest: Mutex::new(manifest),
            ..Default::default()
        };
        Arc::new(handle)
    }

    pub(crate) fn set_status(&self, status: RawTransferStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub(crate) fn fail_mutations_for(&self, index: usize) {
        self.failing_indices.lock().unwrap().push(index);
    }

    pub(crate) fn priorities(&self) -> HashMap<usize, FilePriority> {
        self.priorities.lock().unwrap().clone()
    }

    pub(crate) fn renames(&self) -> HashMap<usize, String> {
        self.renames.lock().unwrap().clone()
    }

    /// `Some(delete_files)` once removed.
    pub(crate) fn removed(&self) -> Option<bool> {
        *self.removed.lock().unwrap()
    }

    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        if self.failing_indices.lock().unwrap().contains(&index) {
            return Err(EngineError::Rejected(format!("index {index} rejected")));
        }
        Ok(())
    }
}

impl TransferHandle for FakeHandle {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn has_metadata(&self) -> bool {
        self.metadata_ready.load(Ordering::SeqCst)
    }

    fn manifest(&self) -> Option<FileManifest> {
        self.manifest.lock().unwrap().clone()
    }

    fn status(&self) -> RawTransferStatus {
        self.status.lock().unwrap().clone()
    }

    fn file_priority(&self, index: usize) -> FilePriority {
        self.priorities
            .lock()
            .unwrap()
            .get(&index)
            .copied()
            .unwrap_or(FilePriority::Normal)
    }

    fn set_file_priority(&self, index: usize, priority: FilePriority) -> Result<(), EngineError> {
        self.check_index(index)?;
        self.priorities.lock().unwrap().insert(index, priority);
        Ok(())
    }

    fn rename_file(&self, index: usize, new_path: &str) -> Result<(), EngineError> {
        self.check_index(index)?;
        self.renames
            .lock()
            .unwrap()
            .insert(index, new_path.to_string());
        Ok(())
    }

    fn remove(&self, delete_files: bool) -> Result<(), EngineError> {
        self.valid.store(false, Ordering::SeqCst);
        *self.removed.lock().unwrap() = Some(delete_files);
        Ok(())
    }
}

/// Hands out pre-scripted handles in order and records add options.
#[derive(Default)]
pub(crate) struct FakeEngine {
    handles: Mutex<Vec<Arc<FakeHandle>>>,
    parse_result: Mutex<Option<FileManifest>>,
    pub(crate) added: Mutex<Vec<AddOptions>>,
}

impl FakeEngine {
    pub(crate) fn with_handles(handles: Vec<Arc<FakeHandle>>) -> Self {
        Self {
            handles: Mutex::new(handles),
            ..Default::default()
        }
    }

    pub(crate) fn set_parse_result(&self, manifest: FileManifest) {
        *self.parse_result.lock().unwrap() = Some(manifest);
    }
}

#[async_trait]
impl TransferEngine for FakeEngine {
    async fn add_transfer(
        &self,
        _source: &TransferSource,
        options: AddOptions,
    ) -> Result<Arc<dyn TransferHandle>, EngineError> {
        self.added.lock().unwrap().push(options);
        let mut handles = self.handles.lock().unwrap();
        if handles.is_empty() {
            return Err(EngineError::Unavailable("no scripted handle".to_string()));
        }
        Ok(handles.remove(0))
    }

    fn parse_metainfo(&self, _bytes: &[u8]) -> Result<FileManifest, EngineError> {
        self.parse_result
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| EngineError::InvalidDescriptor("unparseable metainfo".to_string()))
    }
}
