//! Ariadne GNN core
//!
//! Everything here is synchronous and compute-bound. Loaded state
//! ([`GraphStore`], [`CorpusIndex`], models) is immutable and safe to share
//! across threads; per-call graphs are built and dropped inside each call.
//! Randomness is always supplied by the caller.

pub mod graph;
pub mod inference;
pub mod model;
pub mod recommend;
pub mod sampling;
pub mod snapshot;

pub use graph::{CitationGraph, GraphStore, NodeId};
pub use inference::{ColdStartEmbedder, ColdStartOutput, PaperInput};
pub use model::{EmbeddingModel, SageModel};
pub use recommend::{CorpusIndex, Recommendation};
pub use sampling::{build_query_graph, sample_neighborhood, Subgraph};
