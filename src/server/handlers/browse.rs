//! Sandboxed folder browsing.

use std::io::ErrorKind;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::AppError;
use crate::server::state::AppState;

#[derive(Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub path: Option<String>,
}

/// Advertise the virtual root the UI should start browsing from.
pub async fn base_path() -> Json<Value> {
    Json(json!({
        "base_path": "/",
        "display_path": "/",
    }))
}

/// List folders and files directly under a virtual path.
pub async fn list_folders(
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<Value>, AppError> {
    let path = query.path.unwrap_or_else(|| "/".to_string());
    let sandbox = state.manager.sandbox();
    let internal = sandbox.resolve(&path)?;

    let meta = tokio::fs::metadata(&internal)
        .await
        .map_err(|_| AppError::NotFound("Path not found".to_string()))?;
    if !meta.is_dir() {
        return Err(AppError::NotFound("Path not found".to_string()));
    }

    let mut reader = tokio::fs::read_dir(&internal).await.map_err(|err| {
        if err.kind() == ErrorKind::PermissionDenied {
            AppError::Forbidden("Permission denied".to_string())
        } else {
            AppError::Internal(err.into())
        }
    })?;

    let mut folders = Vec::new();
    let mut files = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|err| AppError::Internal(err.into()))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if file_type.is_dir() {
            folders.push(json!({
                "name": name,
                "path": sandbox.unresolve(&entry.path()),
            }));
        } else if file_type.is_file() {
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            files.push(json!({
                "name": name,
                "size": size,
            }));
        }
    }
    folders.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    files.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    let parent_path = internal
        .ne(sandbox.root())
        .then(|| internal.parent().map(|parent| sandbox.unresolve(parent)))
        .flatten();

    Ok(Json(json!({
        "current_path": path,
        "display_path": path,
        "parent_path": parent_path,
        "folder_count": folders.len(),
        "file_count": files.len(),
        "folders": folders,
        "files": files,
    })))
}
