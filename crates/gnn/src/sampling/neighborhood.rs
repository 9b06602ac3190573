//! Fan-out limited neighbourhood sampling

use super::Subgraph;
use crate::graph::{CitationGraph, NodeId};
use ariadne_common::errors::{AppError, Result};
use rand::{seq::index, Rng};
use std::collections::BTreeSet;

/// Sample a multi-hop neighbourhood of `center` following references.
///
/// Hop `h` expands every node of the current frontier to at most
/// `fanout[h]` distinct cited papers, drawn uniformly without replacement
/// when a node cites more than that. The frontier only advances to the
/// nodes sampled in the previous hop; nodes already visited may be sampled
/// again. A limit of 0 empties the frontier and ends expansion.
///
/// For a fixed graph, center, fan-out and RNG state the result is fully
/// deterministic: frontiers are iterated in ascending id order and the
/// subgraph is laid out in ascending id order.
pub fn sample_neighborhood<G, R>(
    graph: &G,
    center: NodeId,
    fanout: &[usize],
    rng: &mut R,
) -> Result<Subgraph>
where
    G: CitationGraph + ?Sized,
    R: Rng + ?Sized,
{
    if !graph.contains(center) {
        return Err(AppError::OutOfRangeReference {
            id: center.0 as i64,
            num_nodes: graph.num_nodes(),
        });
    }

    let mut visited = BTreeSet::from([center]);
    let mut frontier = BTreeSet::from([center]);

    for (hop, &limit) in fanout.iter().enumerate() {
        if frontier.is_empty() {
            break;
        }

        let mut next_frontier = BTreeSet::new();
        for &node in &frontier {
            let mut candidates = graph.references(node).to_vec();
            candidates.sort_unstable();
            candidates.dedup();

            if candidates.len() > limit {
                next_frontier.extend(
                    index::sample(rng, candidates.len(), limit)
                        .into_iter()
                        .map(|i| candidates[i]),
                );
            } else {
                next_frontier.extend(candidates);
            }
        }

        tracing::trace!(hop, limit, frontier = frontier.len(), sampled = next_frontier.len(), "Hop expanded");

        visited.extend(next_frontier.iter().copied());
        frontier = next_frontier;
    }

    let subgraph = Subgraph::induce(graph, &visited, center);

    tracing::debug!(
        center = %center,
        hops = fanout.len(),
        nodes = subgraph.num_nodes(),
        edges = subgraph.num_edges(),
        "Neighbourhood sampled"
    );

    Ok(subgraph)
}
