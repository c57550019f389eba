//! Media-library endpoints: connectivity, sections, and refresh.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::AppError;
use crate::library::LibraryClient;
use crate::server::state::AppState;

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub library_name: String,
}

fn require_library(state: &AppState) -> Result<Arc<LibraryClient>, AppError> {
    state.library.clone().ok_or_else(|| {
        AppError::Unavailable("Media library not configured or token missing".to_string())
    })
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let library = require_library(&state)?;
    library.health().await?;
    Ok(Json(json!({
        "status": "ok",
        "message": "Media library is connected and working",
    })))
}

pub async fn sections(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let library = require_library(&state)?;
    let sections = library.sections().await?;
    Ok(Json(json!({ "libraries": sections })))
}

/// Trigger a section rescan; completed downloads are swept from the
/// registry on the same call, as the reference service does.
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let library = require_library(&state)?;
    library.refresh(&request.library_name).await?;

    let evicted = state.manager.evict_completed().await;
    if evicted > 0 {
        tracing::debug!(evicted, "dropped completed downloads after refresh");
    }

    Ok(Json(json!({
        "message": format!("Library '{}' refresh started", request.library_name),
    })))
}
