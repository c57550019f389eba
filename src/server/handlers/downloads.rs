//! Handlers for manifest inspection, download start, progress polling,
//! and cancellation.

use anyhow::Context;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::AppError;
use crate::engine::TransferSource;
use crate::server::state::AppState;
use crate::session::Telemetry;

#[derive(Deserialize)]
pub struct MagnetRequest {
    pub magnet_link: String,
    pub download_path: String,
    #[serde(default)]
    pub selected_files: Option<Vec<usize>>,
    #[serde(default)]
    pub skip_parent_folder: bool,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub download_id: String,
}

#[derive(Deserialize)]
pub struct MagnetInfoRequest {
    #[serde(default)]
    pub magnet_link: Option<String>,
}

fn require_magnet(link: Option<String>) -> Result<String, AppError> {
    match link {
        Some(link) if link.starts_with("magnet:") => Ok(link),
        _ => Err(AppError::BadRequest(
            "Invalid magnet link format".to_string(),
        )),
    }
}

/// Resolve a magnet link to its file manifest without starting a download.
pub async fn magnet_info(
    State(state): State<AppState>,
    Json(request): Json<MagnetInfoRequest>,
) -> Result<Json<Value>, AppError> {
    let magnet = require_magnet(request.magnet_link)?;
    tracing::debug!("magnet_info");

    let manifest = state
        .manager
        .inspect(&TransferSource::magnet(magnet))
        .await?;
    Ok(Json(json!({
        "name": manifest.name,
        "total_size": manifest.total_size,
        "num_files": manifest.files.len(),
        "files": manifest.files,
    })))
}

/// Parse an uploaded `.torrent` file into its manifest.
pub async fn metainfo_info(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let upload = read_descriptor_upload(multipart).await?;
    let manifest = state
        .manager
        .inspect(&TransferSource::metainfo(upload.descriptor))
        .await?;
    Ok(Json(json!({
        "name": manifest.name,
        "total_size": manifest.total_size,
        "num_files": manifest.files.len(),
        "files": manifest.files,
    })))
}

/// Start a download from a magnet link.
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<MagnetRequest>,
) -> Result<Json<Value>, AppError> {
    let magnet = require_magnet(Some(request.magnet_link))?;
    tracing::debug!(
        path = %request.download_path,
        selected = ?request.selected_files,
        flatten = request.skip_parent_folder,
        "start_download"
    );

    let id = state
        .manager
        .start(
            TransferSource::magnet(magnet),
            &request.download_path,
            request.selected_files,
            request.skip_parent_folder,
        )
        .await?;
    Ok(Json(json!({
        "download_id": id,
        "message": "Download started",
    })))
}

/// Start a download from an uploaded `.torrent` file. Besides the file the
/// form carries `download_path`, optional JSON `selected_files`, and
/// `skip_parent_folder`.
pub async fn start_download_from_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let upload = read_descriptor_upload(multipart).await?;
    let download_path = upload
        .download_path
        .ok_or_else(|| AppError::BadRequest("missing download_path".to_string()))?;

    let id = state
        .manager
        .start(
            TransferSource::metainfo(upload.descriptor),
            &download_path,
            upload.selected_files,
            upload.skip_parent_folder,
        )
        .await?;
    Ok(Json(json!({
        "download_id": id,
        "message": "Download started",
    })))
}

/// Poll telemetry for one download.
pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Telemetry>, AppError> {
    let telemetry = state
        .manager
        .progress(&id)
        .await
        .ok_or_else(|| AppError::NotFound("Download not found".to_string()))?;
    Ok(Json(telemetry))
}

/// Cancel a download and delete its partial data.
pub async fn cancel_download(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .manager
        .cancel(&request.download_id)
        .await
        .ok_or_else(|| AppError::NotFound("Download not found".to_string()))?;
    Ok(Json(json!({
        "message": "Download cancelled and files deleted",
    })))
}

struct DescriptorUpload {
    descriptor: Vec<u8>,
    download_path: Option<String>,
    selected_files: Option<Vec<usize>>,
    skip_parent_folder: bool,
}

/// Pull the `.torrent` payload and companion form fields out of a
/// multipart body.
async fn read_descriptor_upload(mut multipart: Multipart) -> Result<DescriptorUpload, AppError> {
    let mut descriptor = None;
    let mut download_path = None;
    let mut selected_files = None;
    let mut skip_parent_folder = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .context("read multipart field")?
    {
        match field.name() {
            Some("file") => {
                let valid_name = field
                    .file_name()
                    .map(|name| name.ends_with(".torrent"))
                    .unwrap_or(false);
                if !valid_name {
                    return Err(AppError::BadRequest(
                        "Invalid file type. Please upload a .torrent file".to_string(),
                    ));
                }
                let bytes = field.bytes().await.context("read torrent upload")?;
                descriptor = Some(bytes.to_vec());
            }
            Some("download_path") => {
                download_path = Some(field.text().await.context("read download_path")?);
            }
            Some("selected_files") => {
                // Malformed selections are ignored, matching the reference
                // behavior of downloading everything.
                let raw = field.text().await.context("read selected_files")?;
                selected_files = serde_json::from_str::<Vec<usize>>(&raw).ok();
            }
            Some("skip_parent_folder") => {
                let raw = field.text().await.context("read skip_parent_folder")?;
                skip_parent_folder = matches!(raw.trim(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    let descriptor = descriptor
        .ok_or_else(|| AppError::BadRequest("missing torrent file upload".to_string()))?;
    if descriptor.is_empty() {
        return Err(AppError::BadRequest("Torrent file is empty".to_string()));
    }
    Ok(DescriptorUpload {
        descriptor,
        download_path,
        selected_files,
        skip_parent_folder,
    })
}
