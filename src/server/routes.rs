//! Router definition for the API surface.

use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Router};

use super::handlers::{browse, downloads, library, search};
use super::state::AppState;

/// Uploaded `.torrent` descriptors are small; this bound is generous.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/search", get(search::search_feed))
        .route("/api/torrent/info", post(downloads::magnet_info))
        .route("/api/torrent/info/file", post(downloads::metainfo_info))
        .route("/api/config/base-path", get(browse::base_path))
        .route("/api/folders", get(browse::list_folders))
        .route("/api/download", post(downloads::start_download))
        .route("/api/download/file", post(downloads::start_download_from_file))
        .route("/api/progress/:id", get(downloads::progress))
        .route("/api/cancel", post(downloads::cancel_download))
        .route("/api/library/health", get(library::health))
        .route("/api/library/sections", get(library::sections))
        .route("/api/library/refresh", post(library::refresh))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
