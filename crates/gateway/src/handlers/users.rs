//! Click history handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use ariadne_common::errors::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub node_id: i64,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    /// Most recent clicks, oldest first
    pub history: Vec<usize>,
}

/// Record that a user opened a paper
pub async fn record_click(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<ClickRequest>,
) -> Result<Json<HistoryResponse>> {
    let num_nodes = state.index.len();
    let node_id = usize::try_from(request.node_id)
        .ok()
        .filter(|&id| id < num_nodes)
        .ok_or(AppError::OutOfRangeReference {
            id: request.node_id,
            num_nodes,
        })?;

    let history = state.history.record_click(&user_id, node_id).await;

    Ok(Json(HistoryResponse { user_id, history }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<HistoryResponse> {
    let history = state.history.history(&user_id).await;
    Json(HistoryResponse { user_id, history })
}

pub async fn clear_history(State(state): State<AppState>, Path(user_id): Path<String>) -> StatusCode {
    state.history.clear(&user_id).await;
    tracing::info!(user_id = %user_id, "History cleared");
    StatusCode::NO_CONTENT
}
