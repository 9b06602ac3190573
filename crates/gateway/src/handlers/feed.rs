//! "For You" feed handler

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{run_blocking, validation_error};
use crate::AppState;
use ariadne_common::{catalog::MetadataLookup, errors::Result};
use ariadne_gnn::{recommend, NodeId};

#[derive(Debug, Deserialize, Validate)]
pub struct FeedQuery {
    #[validate(range(max = 500))]
    pub k_similar: Option<usize>,
    #[validate(range(max = 500))]
    pub k_random: Option<usize>,
}

#[derive(Serialize)]
pub struct FeedItem {
    pub node_id: NodeId,
    pub title: String,
    /// Cosine similarity; absent for random fill
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[derive(Serialize)]
pub struct FeedResponse {
    pub user_id: String,
    pub history: Vec<usize>,
    pub items: Vec<FeedItem>,
}

/// Personalized feed ranked against the user's recent clicks
pub async fn get_feed(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>> {
    query.validate().map_err(validation_error)?;

    let k_similar = query.k_similar.unwrap_or(state.config.recommend.k_similar);
    let k_random = query.k_random.unwrap_or(state.config.recommend.k_random);
    let history = state.history.history(&user_id).await;

    let worker = state.clone();
    let clicks: Vec<i64> = history.iter().map(|&id| id as i64).collect();
    let ranked = run_blocking(move || {
        let mut rng = worker.request_rng();
        recommend::recommend(
            &worker.index,
            &clicks,
            k_similar,
            k_random,
            worker.catalog.as_ref(),
            &mut rng,
        )
    })
    .await?;

    let items = ranked
        .into_iter()
        .filter_map(|r| {
            state.catalog.title(r.node_id.0).map(|title| FeedItem {
                node_id: r.node_id,
                title: title.to_string(),
                score: r.score,
            })
        })
        .collect::<Vec<_>>();

    tracing::info!(
        user_id = %user_id,
        history = history.len(),
        items = items.len(),
        "Feed served"
    );

    Ok(Json(FeedResponse {
        user_id,
        history,
        items,
    }))
}
