//! Precomputed corpus embeddings

use crate::graph::NodeId;
use crate::snapshot;
use ariadne_common::errors::{AppError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk corpus layout: `embeddings` is row-major `[N, dim]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    pub dim: usize,
    pub embeddings: Vec<f32>,
}

/// One result of a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbour {
    pub node_id: NodeId,
    /// Squared L2 distance to the query
    pub distance: f32,
}

/// Scale `v` to unit length. Returns false and leaves `v` alone if its
/// norm is zero or not finite.
pub fn l2_normalize(mut v: ArrayViewMut1<'_, f32>) -> bool {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 && norm.is_finite() {
        v /= norm;
        true
    } else {
        false
    }
}

/// Read-only corpus matrix with L2-normalized rows
pub struct CorpusIndex {
    embeddings: Array2<f32>,
}

impl CorpusIndex {
    /// Build from raw rows, normalizing each one. All-zero rows stay zero.
    pub fn new(mut embeddings: Array2<f32>) -> Self {
        let mut degenerate = 0usize;
        for row in embeddings.rows_mut() {
            if !l2_normalize(row) {
                degenerate += 1;
            }
        }
        if degenerate > 0 {
            tracing::warn!(rows = degenerate, "Corpus rows with zero norm left unnormalized");
        }

        Self { embeddings }
    }

    pub fn from_snapshot(snapshot: CorpusSnapshot) -> Result<Self> {
        let CorpusSnapshot { dim, embeddings } = snapshot;

        if dim == 0 || embeddings.len() % dim != 0 {
            return Err(AppError::InvalidFormat {
                message: format!("{} corpus values do not split into rows of {}", embeddings.len(), dim),
            });
        }

        let rows = embeddings.len() / dim;
        let matrix = Array2::from_shape_vec((rows, dim), embeddings).map_err(|e| AppError::InvalidFormat {
            message: e.to_string(),
        })?;
        Ok(Self::new(matrix))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot: CorpusSnapshot = snapshot::read(path)?;
        let index = Self::from_snapshot(snapshot).map_err(|e| AppError::DataLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), papers = index.len(), dim = index.dim(), "Corpus embeddings loaded");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.embeddings.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.embeddings.ncols()
    }

    pub fn embedding(&self, node: NodeId) -> Option<ArrayView1<'_, f32>> {
        (node.0 < self.len()).then(|| self.embeddings.row(node.0))
    }

    /// History ids that name a corpus row, in order
    pub fn valid_history(&self, history: &[i64]) -> Vec<usize> {
        history
            .iter()
            .filter_map(|&id| usize::try_from(id).ok())
            .filter(|&id| id < self.len())
            .collect()
    }

    /// Unit-length query vector for a click history.
    ///
    /// Invalid ids are skipped. The mean of the remaining rows is used, or
    /// the corpus mean when nothing remains. If that mean is the zero vector
    /// it is returned as is.
    pub fn query_vector(&self, history: &[i64]) -> Array1<f32> {
        let valid = self.valid_history(history);

        let mut query = if valid.is_empty() {
            self.embeddings
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(self.dim()))
        } else {
            let mut sum = Array1::<f32>::zeros(self.dim());
            for &id in &valid {
                sum += &self.embeddings.row(id);
            }
            sum / valid.len() as f32
        };

        if !l2_normalize(query.view_mut()) {
            tracing::warn!(history = valid.len(), "Query vector has zero norm");
        }
        query
    }

    /// Profile embedding of a user from the papers they clicked
    pub fn user_embedding(&self, history: &[i64]) -> Array1<f32> {
        self.query_vector(history)
    }

    /// Cosine score of every corpus row against a unit-length query
    pub fn scores(&self, query: ArrayView1<'_, f32>) -> Result<Array1<f32>> {
        self.check_dim(query.len())?;
        Ok(self.embeddings.dot(&query))
    }

    /// The `k` rows closest to `target` by squared L2 distance, nearest
    /// first, ties broken by node id
    pub fn nearest(&self, target: ArrayView1<'_, f32>, k: usize) -> Result<Vec<Neighbour>> {
        self.check_dim(target.len())?;

        let mut neighbours: Vec<Neighbour> = self
            .embeddings
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let diff = &row - &target;
                Neighbour {
                    node_id: NodeId(i),
                    distance: diff.dot(&diff),
                }
            })
            .collect();

        let by_distance = |a: &Neighbour, b: &Neighbour| {
            a.distance.total_cmp(&b.distance).then(a.node_id.cmp(&b.node_id))
        };

        if k == 0 {
            return Ok(Vec::new());
        }
        if k < neighbours.len() {
            neighbours.select_nth_unstable_by(k - 1, by_distance);
            neighbours.truncate(k);
        }
        neighbours.sort_by(by_distance);
        Ok(neighbours)
    }

    fn check_dim(&self, actual: usize) -> Result<()> {
        if actual != self.dim() {
            return Err(AppError::DimensionMismatch {
                what: "query vector".to_string(),
                expected: self.dim(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn norm(v: &Array1<f32>) -> f32 {
        v.dot(v).sqrt()
    }

    fn sample_index() -> CorpusIndex {
        CorpusIndex::new(array![[3.0f32, 4.0], [0.0, 2.0], [-1.0, 0.0], [1.0, 1.0]])
    }

    #[test]
    fn test_rows_normalized_at_load() {
        let index = sample_index();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dim(), 2);
        assert_eq!(index.embedding(NodeId(0)).unwrap(), array![0.6f32, 0.8]);
        assert_eq!(index.embedding(NodeId(1)).unwrap(), array![0.0f32, 1.0]);
        assert!(index.embedding(NodeId(4)).is_none());
    }

    #[test]
    fn test_zero_rows_survive() {
        let index = CorpusIndex::new(array![[0.0f32, 0.0], [2.0, 0.0]]);
        assert_eq!(index.embedding(NodeId(0)).unwrap(), array![0.0f32, 0.0]);
        assert_eq!(index.embedding(NodeId(1)).unwrap(), array![1.0f32, 0.0]);
    }

    #[test]
    fn test_query_vector_unit_norm() {
        let index = sample_index();
        for history in [&[][..], &[1][..], &[0, 1, 3][..], &[2, 2, 0][..]] {
            let q = index.query_vector(history);
            assert!((norm(&q) - 1.0).abs() < 1e-5, "history {:?}", history);
        }
    }

    #[test]
    fn test_invalid_history_ids_filtered() {
        let index = sample_index();
        assert_eq!(index.valid_history(&[-3, 1, 99, 3]), vec![1, 3]);
        assert_eq!(index.query_vector(&[-3, 1, 99]), index.query_vector(&[1]));
        // nothing valid falls back to the corpus mean
        assert_eq!(index.query_vector(&[-1, 4]), index.query_vector(&[]));
    }

    #[test]
    fn test_singleton_history_is_that_row() {
        let index = sample_index();
        let q = index.user_embedding(&[0]);
        assert!((q[0] - 0.6).abs() < 1e-6);
        assert!((q[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_mean_left_as_is() {
        let index = CorpusIndex::new(array![[1.0f32, 0.0], [-1.0, 0.0]]);
        assert_eq!(index.query_vector(&[]), array![0.0f32, 0.0]);
    }

    #[test]
    fn test_nearest_orders_by_distance_then_id() {
        let index = CorpusIndex::new(array![[1.0f32, 0.0], [0.0, 1.0], [1.0, 0.0], [-1.0, 0.0]]);
        let hits = index.nearest(array![1.0f32, 0.0].view(), 3).unwrap();

        let ids: Vec<NodeId> = hits.iter().map(|n| n.node_id).collect();
        assert_eq!(ids, vec![NodeId(0), NodeId(2), NodeId(1)]);
        assert_eq!(hits[0].distance, 0.0);
        assert!((hits[2].distance - 2.0).abs() < 1e-6);

        assert!(index.nearest(array![1.0f32, 0.0].view(), 0).unwrap().is_empty());
        assert_eq!(index.nearest(array![1.0f32, 0.0].view(), 10).unwrap().len(), 4);
    }

    #[test]
    fn test_dimension_checked() {
        let index = sample_index();
        assert!(matches!(
            index.nearest(array![1.0f32, 0.0, 0.0].view(), 1),
            Err(AppError::DimensionMismatch { expected: 2, actual: 3, .. })
        ));
        assert!(index.scores(array![1.0f32].view()).is_err());
    }

    #[test]
    fn test_snapshot_shape_validated() {
        let ok = CorpusIndex::from_snapshot(CorpusSnapshot {
            dim: 2,
            embeddings: vec![1.0, 0.0, 0.0, 1.0],
        })
        .unwrap();
        assert_eq!(ok.len(), 2);

        assert!(CorpusIndex::from_snapshot(CorpusSnapshot {
            dim: 3,
            embeddings: vec![1.0, 0.0, 0.0, 1.0],
        })
        .is_err());
    }
}
