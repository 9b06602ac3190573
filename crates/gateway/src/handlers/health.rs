//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;
use ariadne_gnn::CitationGraph;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub corpus_papers: usize,
    pub catalog_papers: usize,
    pub embedding_dim: usize,
    pub text_model: String,
    pub history_users: usize,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - state is only built once every data file loaded,
/// so a running server is ready; report what it serves
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let graph = state.embedder.graph();

    Json(ReadyResponse {
        status: "ready".to_string(),
        graph_nodes: graph.num_nodes(),
        graph_edges: graph.num_edges(),
        corpus_papers: state.index.len(),
        catalog_papers: state.catalog.len(),
        embedding_dim: state.embedder.output_dim(),
        text_model: state.text_embedder.model_name().to_string(),
        history_users: state.history.num_users().await,
    })
}
