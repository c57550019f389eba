//! Feed search endpoint.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::AppError;
use crate::server::state::AppState;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

pub async fn search_feed(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    tracing::debug!(query = %params.query, "search_feed");
    let results = state.search.search(&params.query).await?;
    Ok(Json(json!({
        "query": params.query,
        "results": results,
    })))
}
