//! GraphSAGE encoder (mean aggregation), inference only
//!
//! Each layer computes
//!
//! ```text
//! h_i = W_l * mean_{i -> j} x_j + b_l + W_r * x_i
//! ```
//!
//! followed by eval-mode batch norm, ReLU on every layer but the last, and a
//! residual connection whenever input and output widths match. Messages flow
//! against edge direction: a citing paper aggregates the papers it cites.
//! Sampled subgraphs only follow references, so this is the direction that
//! reaches the center.

use super::EmbeddingModel;
use ariadne_common::errors::{AppError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized model weights. Matrices are row-major `[out][in]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SageWeights {
    pub mask_token: Vec<f32>,
    pub layers: Vec<SageLayerWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SageLayerWeights {
    pub lin_l_weight: Vec<Vec<f32>>,
    pub lin_l_bias: Vec<f32>,
    pub lin_r_weight: Vec<Vec<f32>>,
    #[serde(default)]
    pub batch_norm: Option<BatchNormWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNormWeights {
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
    pub running_mean: Vec<f32>,
    pub running_var: Vec<f32>,
    #[serde(default = "default_eps")]
    pub eps: f32,
}

fn default_eps() -> f32 { 1e-5 }

/// Batch norm folded into an affine map
struct Affine {
    scale: Array1<f32>,
    shift: Array1<f32>,
}

struct SageLayer {
    /// `[out, in]`
    w_l: Array2<f32>,
    b_l: Array1<f32>,
    /// `[out, in]`
    w_r: Array2<f32>,
    norm: Option<Affine>,
}

impl SageLayer {
    fn in_dim(&self) -> usize {
        self.w_l.ncols()
    }

    fn out_dim(&self) -> usize {
        self.w_l.nrows()
    }

    fn forward(&self, x: &Array2<f32>, edges: &[(usize, usize)]) -> Array2<f32> {
        let n = x.nrows();

        let mut agg = Array2::<f32>::zeros((n, self.in_dim()));
        let mut out_degree = vec![0u32; n];
        for &(src, dst) in edges {
            let mut row = agg.row_mut(src);
            row += &x.row(dst);
            out_degree[src] += 1;
        }
        for (i, &deg) in out_degree.iter().enumerate() {
            if deg > 1 {
                agg.row_mut(i).mapv_inplace(|v| v / deg as f32);
            }
        }

        let mut h = agg.dot(&self.w_l.t());
        h += &self.b_l;
        h += &x.dot(&self.w_r.t());

        if let Some(norm) = &self.norm {
            h *= &norm.scale;
            h += &norm.shift;
        }
        h
    }
}

/// Multi-layer GraphSAGE encoder
pub struct SageModel {
    mask_token: Array1<f32>,
    layers: Vec<SageLayer>,
}

fn matrix(rows: &[Vec<f32>], what: &str) -> Result<Array2<f32>> {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    if rows.iter().any(|r| r.len() != cols) {
        return Err(AppError::InvalidFormat {
            message: format!("{} has ragged rows", what),
        });
    }

    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), cols), flat).map_err(|e| AppError::InvalidFormat {
        message: format!("{}: {}", what, e),
    })
}

fn expect_len(values: &[f32], expected: usize, what: String) -> Result<()> {
    if values.len() != expected {
        return Err(AppError::DimensionMismatch {
            what,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

impl SageModel {
    /// Compile serialized weights, validating the dimension chain
    pub fn from_weights(weights: SageWeights) -> Result<Self> {
        if weights.layers.is_empty() {
            return Err(AppError::InvalidFormat {
                message: "model has no layers".to_string(),
            });
        }

        let mut layers = Vec::with_capacity(weights.layers.len());
        let mut in_dim = weights.mask_token.len();

        for (i, layer) in weights.layers.into_iter().enumerate() {
            let w_l = matrix(&layer.lin_l_weight, &format!("layer {} lin_l", i))?;
            let w_r = matrix(&layer.lin_r_weight, &format!("layer {} lin_r", i))?;
            let out_dim = w_l.nrows();

            if w_l.ncols() != in_dim {
                return Err(AppError::DimensionMismatch {
                    what: format!("layer {} input", i),
                    expected: in_dim,
                    actual: w_l.ncols(),
                });
            }
            if w_r.dim() != w_l.dim() {
                return Err(AppError::InvalidFormat {
                    message: format!("layer {} lin_r shape {:?} != lin_l shape {:?}", i, w_r.dim(), w_l.dim()),
                });
            }
            expect_len(&layer.lin_l_bias, out_dim, format!("layer {} bias", i))?;

            let norm = match layer.batch_norm {
                Some(bn) => {
                    for (name, values) in [
                        ("weight", &bn.weight),
                        ("bias", &bn.bias),
                        ("running_mean", &bn.running_mean),
                        ("running_var", &bn.running_var),
                    ] {
                        expect_len(values, out_dim, format!("layer {} batch norm {}", i, name))?;
                    }

                    let var = Array1::from(bn.running_var);
                    if var.iter().any(|&v| v + bn.eps <= 0.0) {
                        return Err(AppError::InvalidFormat {
                            message: format!("layer {} batch norm has non-positive variance", i),
                        });
                    }

                    let scale = Array1::from(bn.weight) / var.mapv(|v| (v + bn.eps).sqrt());
                    let shift = Array1::from(bn.bias) - &(Array1::from(bn.running_mean) * &scale);
                    Some(Affine { scale, shift })
                }
                None => None,
            };

            layers.push(SageLayer {
                w_l,
                b_l: Array1::from(layer.lin_l_bias),
                w_r,
                norm,
            });
            in_dim = out_dim;
        }

        Ok(Self {
            mask_token: Array1::from(weights.mask_token),
            layers,
        })
    }

    /// Load JSON weights; any failure here is a startup failure
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data_error = |message: String| AppError::DataLoad {
            path: path.display().to_string(),
            message,
        };

        let bytes = std::fs::read(path).map_err(|e| data_error(e.to_string()))?;
        let weights: SageWeights = serde_json::from_slice(&bytes).map_err(|e| data_error(e.to_string()))?;
        let model = Self::from_weights(weights).map_err(|e| data_error(e.to_string()))?;

        tracing::info!(
            path = %path.display(),
            layers = model.layers.len(),
            input_dim = model.input_dim(),
            output_dim = model.output_dim(),
            "GNN weights loaded"
        );
        Ok(model)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Randomly initialised model for tests; `dims` is `[in, hidden.., out]`
    #[cfg(test)]
    pub(crate) fn seeded(dims: &[usize], seed: u64) -> Self {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(seed);
        let mut random = |rows: usize, cols: usize| -> Vec<Vec<f32>> {
            (0..rows)
                .map(|_| (0..cols).map(|_| rng.gen_range(-0.5..0.5)).collect())
                .collect()
        };

        let layers = dims
            .windows(2)
            .map(|w| SageLayerWeights {
                lin_l_weight: random(w[1], w[0]),
                lin_l_bias: vec![0.01; w[1]],
                lin_r_weight: random(w[1], w[0]),
                batch_norm: None,
            })
            .collect();

        let mask_token = random(1, dims[0]).remove(0);
        Self::from_weights(SageWeights { mask_token, layers }).expect("consistent test dimensions")
    }
}

impl EmbeddingModel for SageModel {
    fn input_dim(&self) -> usize {
        self.mask_token.len()
    }

    fn output_dim(&self) -> usize {
        self.layers.last().map(SageLayer::out_dim).unwrap_or(0)
    }

    fn mask_token(&self) -> ArrayView1<'_, f32> {
        self.mask_token.view()
    }

    fn infer(&self, features: ArrayView2<'_, f32>, edges: &[(usize, usize)]) -> Result<Array2<f32>> {
        let n = features.nrows();

        if features.ncols() != self.input_dim() {
            return Err(AppError::inference(format!(
                "expected {} input features, got {}",
                self.input_dim(),
                features.ncols()
            )));
        }
        if let Some(&(src, dst)) = edges.iter().find(|(s, d)| *s >= n || *d >= n) {
            return Err(AppError::inference(format!(
                "edge ({}, {}) outside a graph of {} nodes",
                src, dst, n
            )));
        }

        let last = self.layers.len() - 1;
        let mut x = features.to_owned();

        for (i, layer) in self.layers.iter().enumerate() {
            let mut h = layer.forward(&x, edges);

            if i != last {
                h.mapv_inplace(|v| v.max(0.0));
            }
            if h.dim() == x.dim() {
                h += &x;
            }
            x = h;
        }

        if x.iter().any(|v| !v.is_finite()) {
            return Err(AppError::inference("model produced non-finite values"));
        }
        Ok(x)
    }
}
