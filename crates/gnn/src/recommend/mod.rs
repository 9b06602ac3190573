//! Similarity search and feed ranking over precomputed corpus embeddings

mod feed;
mod index;

pub use feed::{random_papers, recommend, Recommendation};
pub use index::{l2_normalize, CorpusIndex, CorpusSnapshot, Neighbour};
