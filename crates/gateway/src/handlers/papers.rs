//! Paper lookup handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{run_blocking, validation_error};
use crate::AppState;
use ariadne_common::{
    catalog::{mag_id_numeric, MetadataLookup, PaperRecord},
    errors::{AppError, Result},
};
use ariadne_gnn::{recommend, CitationGraph, NodeId, Recommendation};

const DEFAULT_SIMILAR_K: usize = 10;

/// Response for getting a paper
#[derive(Serialize)]
pub struct PaperResponse {
    pub node_id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_numeric_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Number of outgoing citations in the graph
    pub references: usize,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub mag_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SimilarQuery {
    #[validate(range(min = 1, max = 100))]
    pub k: Option<usize>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RandomQuery {
    #[validate(range(min = 1, max = 100))]
    pub n: Option<usize>,
}

/// One nearest-neighbour hit
#[derive(Debug, Serialize)]
pub struct SimilarPaper {
    pub node_id: NodeId,
    pub title: String,
    /// Squared L2 distance between normalized embeddings
    pub distance: f32,
}

#[derive(Serialize)]
pub struct SimilarResponse {
    pub node_id: usize,
    pub items: Vec<SimilarPaper>,
}

#[derive(Serialize)]
pub struct RandomResponse {
    pub items: Vec<Recommendation>,
}

fn paper_response(state: &AppState, record: &PaperRecord) -> PaperResponse {
    let graph = state.embedder.graph();
    let node = NodeId(record.node_id);

    PaperResponse {
        node_id: record.node_id,
        mag_numeric_id: record.mag_id.as_deref().map(|id| mag_id_numeric(id).to_string()),
        mag_id: record.mag_id.clone(),
        title: record.title.clone(),
        references: if graph.contains(node) { graph.reference_count(node) } else { 0 },
    }
}

/// Titled corpus papers nearest to `target`, skipping `exclude`
pub(crate) fn similar_to(
    state: &AppState,
    target: ArrayView1<'_, f32>,
    k: usize,
    exclude: Option<NodeId>,
) -> Result<Vec<SimilarPaper>> {
    let neighbours = state.index.nearest(target, state.index.len())?;

    Ok(neighbours
        .into_iter()
        .filter(|n| Some(n.node_id) != exclude)
        .filter_map(|n| {
            state.catalog.title(n.node_id.0).map(|title| SimilarPaper {
                node_id: n.node_id,
                title: title.to_string(),
                distance: n.distance,
            })
        })
        .take(k)
        .collect())
}

/// Get a paper by node id
pub async fn get_paper(
    State(state): State<AppState>,
    Path(node_id): Path<usize>,
) -> Result<Json<PaperResponse>> {
    let record = state
        .catalog
        .get(node_id)
        .ok_or_else(|| AppError::PaperNotFound { id: node_id.to_string() })?;

    Ok(Json(paper_response(&state, record)))
}

/// Find a paper by MAG id in any accepted spelling
pub async fn lookup_paper(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<PaperResponse>> {
    let record = state
        .catalog
        .find_by_mag_id(&query.mag_id)
        .ok_or_else(|| AppError::PaperNotFound { id: query.mag_id.clone() })?;

    Ok(Json(paper_response(&state, record)))
}

/// Papers whose corpus embeddings are closest to this one
pub async fn similar_papers(
    State(state): State<AppState>,
    Path(node_id): Path<usize>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<SimilarResponse>> {
    query.validate().map_err(validation_error)?;
    let k = query.k.unwrap_or(DEFAULT_SIMILAR_K);

    let target = state
        .index
        .embedding(NodeId(node_id))
        .ok_or_else(|| AppError::PaperNotFound { id: node_id.to_string() })?
        .to_owned();

    let worker = state.clone();
    let items = run_blocking(move || similar_to(&worker, target.view(), k, Some(NodeId(node_id)))).await?;

    tracing::debug!(node_id, k, returned = items.len(), "Similar papers served");

    Ok(Json(SimilarResponse { node_id, items }))
}

/// Random titled papers, for clients that want no personalization
pub async fn random_papers(
    State(state): State<AppState>,
    Query(query): Query<RandomQuery>,
) -> Result<Json<RandomResponse>> {
    query.validate().map_err(validation_error)?;
    let n = query.n.unwrap_or(state.config.recommend.k_random);

    let worker = state.clone();
    let items = run_blocking(move || {
        let mut rng = worker.request_rng();
        Ok(recommend::random_papers(&worker.index, n, worker.catalog.as_ref(), &mut rng))
    })
    .await?;

    Ok(Json(RandomResponse { items }))
}
