//! Citation graph representation
//!
//! Nodes are papers with dense ids `[0, num_nodes)`; a directed edge points
//! from the citing paper to the cited paper.

mod extended;
mod store;

pub use extended::{validate_citations, ExtendedGraph};
pub use store::{GraphSnapshot, GraphStore};

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Global node id within one graph instance.
///
/// Subgraph-local row indices are plain `usize` and never wrapped in this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read access to a citation graph with per-node input features
pub trait CitationGraph {
    /// Number of nodes; valid ids are `0..num_nodes()`
    fn num_nodes(&self) -> usize;

    /// Width of every feature row
    fn feature_dim(&self) -> usize;

    /// Papers cited by `node`, in edge order (parallel edges repeat).
    /// Unknown ids have no references.
    fn references(&self, node: NodeId) -> &[NodeId];

    /// Input feature row of `node`. Panics if `node` is out of range.
    fn features(&self, node: NodeId) -> ArrayView1<'_, f32>;

    fn contains(&self, node: NodeId) -> bool {
        node.0 < self.num_nodes()
    }
}
