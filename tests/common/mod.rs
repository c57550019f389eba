#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use windlass::common::config::SearchSettings;
use windlass::downloads::{DownloadManager, DownloadSettings};
use windlass::engine::{
    AddOptions, EngineError, FileEntry, FileManifest, FilePriority, RawTransferStatus,
    TransferEngine, TransferHandle, TransferSource,
};
use windlass::sandbox::PathSandbox;
use windlass::search::SearchClient;
use windlass::server::{routes, AppState};

//=============
// Engine Double
//=============

#[derive(Default)]
pub struct ScriptedHandle {
    valid: AtomicBool,
    metadata_ready: AtomicBool,
    manifest: Mutex<Option<FileManifest>>,
    status: Mutex<RawTransferStatus>,
    priorities: Mutex<HashMap<usize, FilePriority>>,
    renames: Mutex<HashMap<usize, String>>,
    removed: Mutex<Option<bool>>,
}

impl ScriptedHandle {
    pub fn new(manifest: Option<FileManifest>) -> Arc<Self> {
        Arc::new(Self {
            valid: AtomicBool::new(true),
            metadata_ready: AtomicBool::new(manifest.is_some()),
            manifest: Mutex::new(manifest),
            ..Default::default()
        })
    }

    pub fn set_status(&self, status: RawTransferStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn priorities(&self) -> HashMap<usize, FilePriority> {
        self.priorities.lock().unwrap().clone()
    }

    pub fn renames(&self) -> HashMap<usize, String> {
        self.renames.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Option<bool> {
        *self.removed.lock().unwrap()
    }
}

impl TransferHandle for ScriptedHandle {
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
        self.priorities.lock().unwrap().insert(index, priority);
        Ok(())
    }

    fn rename_file(&self, index: usize, new_path: &str) -> Result<(), EngineError> {
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

#[derive(Default)]
pub struct ScriptedEngine {
    handles: Mutex<Vec<Arc<ScriptedHandle>>>,
    parse_result: Mutex<Option<FileManifest>>,
}

impl ScriptedEngine {
    pub fn with_handles(handles: Vec<Arc<ScriptedHandle>>) -> Arc<Self> {
        Arc::new(Self {
            handles: Mutex::new(handles),
            ..Default::default()
        })
    }

    pub fn set_parse_result(&self, manifest: FileManifest) {
        *self.parse_result.lock().unwrap() = Some(manifest);
    }
}

#[async_trait]
impl TransferEngine for ScriptedEngine {
    async fn add_transfer(
        &self,
        _source: &TransferSource,
        _options: AddOptions,
    ) -> Result<Arc<dyn TransferHandle>, EngineError> {
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

//============
// Fixtures
//============

pub fn two_file_manifest() -> FileManifest {
    FileManifest {
        name: "show".to_string(),
        total_size: 300_000_000,
        files: vec![
            FileEntry {
                index: 0,
                path: "show/episode1.mkv".to_string(),
                size: 100_000_000,
            },
            FileEntry {
                index: 1,
                path: "show/episode2.mkv".to_string(),
                size: 200_000_000,
            },
        ],
    }
}

//============
// App Factory
//============

pub struct TestApp {
    pub app: Router,
    pub root: TempDir,
    pub engine: Arc<ScriptedEngine>,
}

pub fn test_app(handles: Vec<Arc<ScriptedHandle>>) -> TestApp {
    let root = TempDir::new().expect("create temp root");
    let engine = ScriptedEngine::with_handles(handles);
    let manager = Arc::new(DownloadManager::new(
        engine.clone(),
        PathSandbox::new(root.path().to_path_buf()),
        DownloadSettings {
            metadata_timeout: Duration::from_millis(200),
            scratch_dir: std::env::temp_dir(),
        },
    ));
    let search = Arc::new(SearchClient::new(SearchSettings::default()).expect("search client"));
    let app = routes::router(AppState::new(manager, search, None));
    TestApp { app, root, engine }
}

//=================
// Request Builders
//=================

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

pub fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(&json).expect("serialize json"),
        ))
        .expect("build request")
}

const BOUNDARY: &str = "----WindlassTestBoundary";

/// Multipart body with one uploaded file plus plain text fields.
pub fn post_multipart(
    uri: &str,
    file_name: &str,
    file_bytes: &[u8],
    fields: &[(&str, &str)],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(b"\r\n");
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build request")
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response: Response<Body> = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should complete");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}
