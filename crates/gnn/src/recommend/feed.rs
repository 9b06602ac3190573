//! "For You" feed ranking

use super::CorpusIndex;
use crate::graph::NodeId;
use ariadne_common::catalog::MetadataLookup;
use ariadne_common::errors::Result;
use ariadne_common::metrics;
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Instant;

/// One feed entry. Similar entries carry their cosine score, random fill
/// entries do not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub node_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Rank the corpus against a click history.
///
/// Returns up to `k_similar` scored papers (highest score first, ties by
/// node id) followed by up to `k_random` unscored papers drawn uniformly from
/// the rest. Clicked papers never appear among the similar entries and
/// nothing without a title appears at all. An under-filled feed is not an
/// error.
pub fn recommend<R: Rng + ?Sized>(
    index: &CorpusIndex,
    history: &[i64],
    k_similar: usize,
    k_random: usize,
    metadata: &dyn MetadataLookup,
    rng: &mut R,
) -> Result<Vec<Recommendation>> {
    let start = Instant::now();

    let query = index.query_vector(history);
    let scores = index.scores(query.view())?;

    let clicked: HashSet<usize> = index.valid_history(history).into_iter().collect();
    let mut candidates: Vec<usize> = (0..index.len())
        .filter(|id| !clicked.contains(id) && metadata.is_displayable(*id))
        .collect();

    let by_score = |a: &usize, b: &usize| -> Ordering { scores[*b].total_cmp(&scores[*a]).then(a.cmp(b)) };

    if k_similar == 0 {
        candidates.clear();
    } else if k_similar < candidates.len() {
        candidates.select_nth_unstable_by(k_similar - 1, by_score);
        candidates.truncate(k_similar);
    }
    candidates.sort_by(by_score);

    let mut feed: Vec<Recommendation> = candidates
        .iter()
        .map(|&id| Recommendation {
            node_id: NodeId(id),
            score: Some(scores[id]),
        })
        .collect();

    let similar: HashSet<usize> = candidates.into_iter().collect();
    let pool: Vec<usize> = (0..index.len())
        .filter(|id| !similar.contains(id) && metadata.is_displayable(*id))
        .collect();

    feed.extend(pool.choose_multiple(rng, k_random).map(|&id| Recommendation {
        node_id: NodeId(id),
        score: None,
    }));

    if feed.len() < k_similar + k_random {
        tracing::debug!(
            requested = k_similar + k_random,
            returned = feed.len(),
            "Feed under-filled"
        );
    }

    metrics::record_recommendation(start.elapsed().as_secs_f64(), clicked.len(), feed.len());
    Ok(feed)
}

/// Feed of `n` random titled papers, used when no history is wanted at all
pub fn random_papers<R: Rng + ?Sized>(
    index: &CorpusIndex,
    n: usize,
    metadata: &dyn MetadataLookup,
    rng: &mut R,
) -> Vec<Recommendation> {
    let pool: Vec<usize> = (0..index.len()).filter(|&id| metadata.is_displayable(id)).collect();

    pool.choose_multiple(rng, n)
        .map(|&id| Recommendation {
            node_id: NodeId(id),
            score: None,
        })
        .collect()
}
