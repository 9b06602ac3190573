//! In-memory citation graph store
//!
//! Loaded once at startup and read-only afterwards. Outgoing references are
//! kept in compressed sparse row form so neighbour lookup is a slice borrow.

use super::{CitationGraph, NodeId};
use crate::snapshot;
use ariadne_common::errors::{AppError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized form of a citation graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub num_nodes: usize,
    pub feature_dim: usize,
    /// Row-major `num_nodes x feature_dim` matrix
    pub features: Vec<f32>,
    /// `[citing, cited]` pairs
    pub edges: Vec<[usize; 2]>,
}

/// Full citation graph with node features
#[derive(Debug, Clone)]
pub struct GraphStore {
    features: Array2<f32>,
    /// `offsets[i]..offsets[i + 1]` indexes the references of node `i`
    offsets: Vec<usize>,
    targets: Vec<NodeId>,
}

impl GraphStore {
    /// Build a graph from a feature matrix and `(citing, cited)` edges.
    ///
    /// Fails when an edge endpoint is not a row of `features`.
    pub fn from_parts(features: Array2<f32>, edges: &[(usize, usize)]) -> Result<Self> {
        let num_nodes = features.nrows();

        if let Some(&(src, dst)) = edges.iter().find(|(s, d)| *s >= num_nodes || *d >= num_nodes) {
            let id = if src >= num_nodes { src } else { dst };
            return Err(AppError::OutOfRangeReference {
                id: id as i64,
                num_nodes,
            });
        }

        // Counting sort by source keeps per-source edge order
        let mut offsets = vec![0usize; num_nodes + 1];
        for &(src, _) in edges {
            offsets[src + 1] += 1;
        }
        for i in 0..num_nodes {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor = offsets.clone();
        let mut targets = vec![NodeId(0); edges.len()];
        for &(src, dst) in edges {
            targets[cursor[src]] = NodeId(dst);
            cursor[src] += 1;
        }

        Ok(Self {
            features,
            offsets,
            targets,
        })
    }

    /// Rebuild a graph from its snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let GraphSnapshot { num_nodes, feature_dim, features, edges } = snapshot;

        let features = Array2::from_shape_vec((num_nodes, feature_dim), features).map_err(|e| {
            AppError::InvalidFormat {
                message: format!("feature matrix is not {}x{}: {}", num_nodes, feature_dim, e),
            }
        })?;
        let edges: Vec<(usize, usize)> = edges.into_iter().map(|[s, d]| (s, d)).collect();

        Self::from_parts(features, &edges)
    }

    /// Load a graph snapshot; any failure here is a startup failure
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot: GraphSnapshot = snapshot::read(path)?;

        let graph = Self::from_snapshot(snapshot).map_err(|e| AppError::DataLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::info!(
            path = %path.display(),
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            feature_dim = graph.feature_dim(),
            "Citation graph loaded"
        );
        Ok(graph)
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let mut edges = Vec::with_capacity(self.targets.len());
        for src in 0..self.num_nodes() {
            for dst in self.references(NodeId(src)) {
                edges.push([src, dst.0]);
            }
        }

        GraphSnapshot {
            num_nodes: self.num_nodes(),
            feature_dim: self.feature_dim(),
            features: self.features.iter().copied().collect(),
            edges,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        snapshot::write(path.as_ref(), &self.to_snapshot())
    }

    pub fn num_edges(&self) -> usize {
        self.targets.len()
    }

    pub fn feature_matrix(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    /// Out-degree (parallel edges counted)
    pub fn reference_count(&self, node: NodeId) -> usize {
        self.references(node).len()
    }
}

impl CitationGraph for GraphStore {
    fn num_nodes(&self) -> usize {
        self.features.nrows()
    }

    fn feature_dim(&self) -> usize {
        self.features.ncols()
    }

    fn references(&self, node: NodeId) -> &[NodeId] {
        if node.0 >= self.num_nodes() {
            return &[];
        }
        &self.targets[self.offsets[node.0]..self.offsets[node.0 + 1]]
    }

    fn features(&self, node: NodeId) -> ArrayView1<'_, f32> {
        self.features.row(node.0)
    }
}
