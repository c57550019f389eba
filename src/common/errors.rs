//! HTTP-facing error type for the API surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::downloads::DownloadError;
use crate::engine::EngineError;
use crate::library::LibraryError;
use crate::sandbox::SandboxError;
use crate::search::SearchError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Timeout(String),
    Conflict(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Timeout(msg)
            | AppError::Conflict(msg)
            | AppError::Unavailable(msg) => msg.clone(),
            AppError::Internal(err) => err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(err) = &self {
            tracing::error!(error = ?err, "internal error");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<SandboxError> for AppError {
    fn from(err: SandboxError) -> Self {
        AppError::Forbidden(err.to_string())
    }
}

impl From<DownloadError> for AppError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Sandbox(inner) => inner.into(),
            DownloadError::PathMissing(_) => AppError::NotFound(err.to_string()),
            DownloadError::Duplicate(_) => AppError::Conflict(err.to_string()),
            DownloadError::MetadataTimeout => AppError::Timeout(err.to_string()),
            DownloadError::Engine(inner) => inner.into(),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidDescriptor(_) | EngineError::Rejected(_) => {
                AppError::BadRequest(err.to_string())
            }
            EngineError::Unavailable(_) => AppError::Unavailable(err.to_string()),
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::Upstream(_) => AppError::Unavailable(err.to_string()),
            LibraryError::UnknownSection(_) => AppError::NotFound(err.to_string()),
        }
    }
}
