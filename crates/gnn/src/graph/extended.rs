//! Base graph extended with one synthetic paper
//!
//! The synthetic node takes id `base.num_nodes()` and only has outgoing
//! citations into the base graph. The base graph is borrowed, never copied.

use super::{CitationGraph, NodeId};
use ariadne_common::errors::{AppError, Result};
use ndarray::{Array1, ArrayView1};

/// Check that every citation names an existing node of a graph with
/// `num_nodes` nodes. Duplicates are kept.
pub fn validate_citations(cited_node_ids: &[i64], num_nodes: usize) -> Result<Vec<NodeId>> {
    cited_node_ids
        .iter()
        .map(|&id| {
            usize::try_from(id)
                .ok()
                .filter(|&idx| idx < num_nodes)
                .map(NodeId)
                .ok_or(AppError::OutOfRangeReference { id, num_nodes })
        })
        .collect()
}

/// Read-only view of `base` plus one new node
pub struct ExtendedGraph<'a, G: CitationGraph + ?Sized> {
    base: &'a G,
    new_features: Array1<f32>,
    new_references: Vec<NodeId>,
}

impl<'a, G: CitationGraph + ?Sized> ExtendedGraph<'a, G> {
    /// Append a paper with the given input features and citations.
    ///
    /// Fails on any out-of-range citation or a feature row of the wrong width;
    /// nothing is built in that case.
    pub fn new(base: &'a G, cited_node_ids: &[i64], new_features: ArrayView1<'_, f32>) -> Result<Self> {
        let new_references = validate_citations(cited_node_ids, base.num_nodes())?;

        if new_features.len() != base.feature_dim() {
            return Err(AppError::DimensionMismatch {
                what: "new paper embedding".to_string(),
                expected: base.feature_dim(),
                actual: new_features.len(),
            });
        }

        Ok(Self {
            base,
            new_features: new_features.to_owned(),
            new_references,
        })
    }

    /// Id of the synthetic node
    pub fn new_node(&self) -> NodeId {
        NodeId(self.base.num_nodes())
    }

    pub fn base(&self) -> &G {
        self.base
    }
}

impl<G: CitationGraph + ?Sized> CitationGraph for ExtendedGraph<'_, G> {
    fn num_nodes(&self) -> usize {
        self.base.num_nodes() + 1
    }

    fn feature_dim(&self) -> usize {
        self.base.feature_dim()
    }

    fn references(&self, node: NodeId) -> &[NodeId] {
        if node == self.new_node() {
            &self.new_references
        } else {
            self.base.references(node)
        }
    }

    fn features(&self, node: NodeId) -> ArrayView1<'_, f32> {
        if node == self.new_node() {
            self.new_features.view()
        } else {
            self.base.features(node)
        }
    }
}
