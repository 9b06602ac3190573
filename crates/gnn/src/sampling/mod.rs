//! Neighbourhood sampling around a center paper
//!
//! Provides:
//! - [`Subgraph`]: induced, relabelled neighbourhood with its local -> global map
//! - [`sample_neighborhood`]: fan-out limited BFS over references
//! - [`build_query_graph`]: cold-start neighbourhood for a paper not yet in the graph

mod neighborhood;
mod query;

pub use neighborhood::sample_neighborhood;
pub use query::build_query_graph;

use crate::graph::{CitationGraph, NodeId};
use ariadne_common::errors::{AppError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use std::collections::BTreeSet;

/// Induced subgraph with local indices `0..num_nodes()`.
///
/// `nodes[local]` is the global id of local row `local`; nodes are strictly
/// ascending by global id, so the mapping is a bijection and lookups in
/// either direction are cheap.
#[derive(Debug, Clone)]
pub struct Subgraph {
    nodes: Vec<NodeId>,
    edges: Vec<(usize, usize)>,
    features: Array2<f32>,
    center: usize,
}

impl Subgraph {
    /// Induce the subgraph of `graph` on `visited` and locate `center`.
    ///
    /// Every edge with both endpoints inside `visited` is kept, parallel
    /// edges included.
    pub(crate) fn induce<G: CitationGraph + ?Sized>(
        graph: &G,
        visited: &BTreeSet<NodeId>,
        center: NodeId,
    ) -> Self {
        let nodes: Vec<NodeId> = visited.iter().copied().collect();
        debug_assert!(nodes.windows(2).all(|w| w[0] < w[1]));

        let mut features = Array2::<f32>::zeros((nodes.len(), graph.feature_dim()));
        let mut edges = Vec::new();

        for (local, &node) in nodes.iter().enumerate() {
            features.row_mut(local).assign(&graph.features(node));

            for target in graph.references(node) {
                if let Ok(local_target) = nodes.binary_search(target) {
                    edges.push((local, local_target));
                }
            }
        }

        let center = nodes
            .binary_search(&center)
            .expect("center is always part of the visited set");

        Self {
            nodes,
            edges,
            features,
            center,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Local index of the center node
    pub fn center(&self) -> usize {
        self.center
    }

    /// Global id of the center node
    pub fn center_id(&self) -> NodeId {
        self.nodes[self.center]
    }

    /// Global ids in local order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Edges as `(citing, cited)` local indices
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn global_id(&self, local: usize) -> Option<NodeId> {
        self.nodes.get(local).copied()
    }

    pub fn local_index(&self, node: NodeId) -> Option<usize> {
        self.nodes.binary_search(&node).ok()
    }

    /// Replace the center's input features with `mask`
    pub fn mask_center(&mut self, mask: ArrayView1<'_, f32>) -> Result<()> {
        if mask.len() != self.features.ncols() {
            return Err(AppError::DimensionMismatch {
                what: "mask token".to_string(),
                expected: self.features.ncols(),
                actual: mask.len(),
            });
        }

        self.features.row_mut(self.center).assign(&mask);
        Ok(())
    }
}
