//! Graph embedding models
//!
//! The core only needs a pure `(features, edges) -> embeddings` function and
//! the model's mask token. Masking itself is done by the caller.

mod sage;

pub use sage::{BatchNormWeights, SageLayerWeights, SageModel, SageWeights};

use ariadne_common::errors::Result;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Learned node embedding function, deterministic at inference time
pub trait EmbeddingModel: Send + Sync {
    /// Width of input feature rows
    fn input_dim(&self) -> usize;

    /// Width of output embedding rows
    fn output_dim(&self) -> usize;

    /// Placeholder features for a node whose representation must be
    /// reconstructed from its neighbourhood
    fn mask_token(&self) -> ArrayView1<'_, f32>;

    /// Run message passing over `edges` (local `(source, target)` pairs).
    ///
    /// Returns one `output_dim` row per input row, or `InferenceFailed` on
    /// shape errors and non-finite output.
    fn infer(&self, features: ArrayView2<'_, f32>, edges: &[(usize, usize)]) -> Result<Array2<f32>>;
}
