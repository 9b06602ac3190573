//! Embedding handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::papers::{similar_to, SimilarPaper};
use super::{run_blocking, validation_error};
use crate::AppState;
use ariadne_common::errors::{AppError, Result};
use ariadne_gnn::{recommend::l2_normalize, CitationGraph, NodeId, PaperInput};

const DEFAULT_SIMILAR_K: usize = 10;

/// Request to embed a paper that is not in the graph
#[derive(Debug, Deserialize, Validate)]
pub struct ColdStartRequest {
    /// Node ids of the papers it cites
    #[validate(length(max = 10000))]
    pub citations: Vec<i64>,

    /// Precomputed text embedding of the paper
    #[serde(default)]
    #[validate(length(min = 1))]
    pub embedding: Option<Vec<f32>>,

    /// Title and abstract, embedded server-side
    #[serde(default)]
    #[validate(length(min = 1, max = 50000))]
    pub text: Option<String>,

    /// Number of similar corpus papers to return
    #[validate(range(max = 100))]
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct ColdStartResponse {
    pub embedding: Vec<f32>,
    pub dimension: usize,
    pub subgraph_nodes: usize,
    pub subgraph_edges: usize,
    pub similar: Vec<SimilarPaper>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReembedQuery {
    #[validate(range(max = 100))]
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct ReembedResponse {
    pub node_id: usize,
    pub embedding: Vec<f32>,
    pub dimension: usize,
    pub subgraph_nodes: usize,
    pub subgraph_edges: usize,
    /// Cosine similarity to the stored corpus embedding
    pub stored_similarity: f32,
    pub similar: Vec<SimilarPaper>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserEmbeddingRequest {
    /// Clicked node ids; invalid ones are ignored
    #[validate(length(max = 1000))]
    pub ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct UserEmbeddingResponse {
    pub embedding: Vec<f32>,
    pub used_ids: Vec<usize>,
}

/// Embed a new paper from its citations and text
pub async fn cold_start(
    State(state): State<AppState>,
    Json(request): Json<ColdStartRequest>,
) -> Result<Json<ColdStartResponse>> {
    request.validate().map_err(validation_error)?;

    let input = match (request.embedding, request.text) {
        (Some(embedding), None) => PaperInput::Embedding(embedding),
        (None, Some(text)) => PaperInput::Text(text),
        _ => {
            return Err(AppError::Validation {
                message: "Exactly one of `embedding` or `text` is required".to_string(),
                field: None,
            })
        }
    };

    let paper_embedding = input.resolve(state.text_embedder.as_ref()).await?;
    let citations = request.citations;
    let k = request.k.unwrap_or(DEFAULT_SIMILAR_K);

    let worker = state.clone();
    let (output, similar) = run_blocking(move || {
        let mut rng = worker.request_rng();
        let output = worker.embedder.infer(&citations, &paper_embedding, &mut rng)?;

        let mut query = output.embedding.clone();
        l2_normalize(query.view_mut());
        let similar = similar_to(&worker, query.view(), k, None)?;

        Ok((output, similar))
    })
    .await?;

    Ok(Json(ColdStartResponse {
        dimension: output.embedding.len(),
        embedding: output.embedding.to_vec(),
        subgraph_nodes: output.subgraph_nodes,
        subgraph_edges: output.subgraph_edges,
        similar,
    }))
}

/// Re-embed a paper already in the graph through the masked path, as if it
/// were new, and compare against its stored embedding
pub async fn reembed_existing(
    State(state): State<AppState>,
    Path(node_id): Path<usize>,
    Query(query): Query<ReembedQuery>,
) -> Result<Json<ReembedResponse>> {
    query.validate().map_err(validation_error)?;
    let k = query.k.unwrap_or(DEFAULT_SIMILAR_K);
    let node = NodeId(node_id);

    if !state.embedder.graph().contains(node) {
        return Err(AppError::PaperNotFound { id: node_id.to_string() });
    }

    let worker = state.clone();
    let (output, stored_similarity, similar) = run_blocking(move || {
        let mut rng = worker.request_rng();
        let output = worker.embedder.infer_existing(node, &mut rng)?;

        let mut query = output.embedding.clone();
        l2_normalize(query.view_mut());
        let stored_similarity = worker
            .index
            .embedding(node)
            .map(|stored| stored.dot(&query))
            .unwrap_or(0.0);
        let similar = similar_to(&worker, query.view(), k, Some(node))?;

        Ok((output, stored_similarity, similar))
    })
    .await?;

    Ok(Json(ReembedResponse {
        node_id,
        dimension: output.embedding.len(),
        embedding: output.embedding.to_vec(),
        subgraph_nodes: output.subgraph_nodes,
        subgraph_edges: output.subgraph_edges,
        stored_similarity,
        similar,
    }))
}

/// Profile embedding for a set of clicked papers
pub async fn user_embedding(
    State(state): State<AppState>,
    Json(request): Json<UserEmbeddingRequest>,
) -> Result<Json<UserEmbeddingResponse>> {
    request.validate().map_err(validation_error)?;

    let index = state.index.clone();
    let response = run_blocking(move || {
        Ok(UserEmbeddingResponse {
            embedding: index.user_embedding(&request.ids).to_vec(),
            used_ids: index.valid_history(&request.ids),
        })
    })
    .await?;

    Ok(Json(response))
}
