//! Cold-start inference
//!
//! Composes query graph construction, center masking and the embedding
//! model. The model never sees the center's own input features: they are
//! replaced by the model's mask token before message passing.

use crate::graph::{CitationGraph, GraphStore, NodeId};
use crate::model::EmbeddingModel;
use crate::sampling::{build_query_graph, sample_neighborhood, Subgraph};
use ariadne_common::embeddings::Embedder;
use ariadne_common::errors::{AppError, Result};
use ariadne_common::metrics;
use ndarray::Array1;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

/// Input-space representation of a new paper
#[derive(Debug, Clone)]
pub enum PaperInput {
    /// Precomputed text embedding
    Embedding(Vec<f32>),
    /// Raw text, embedded through an [`Embedder`] first
    Text(String),
}

impl PaperInput {
    /// Turn the input into an input-space embedding
    pub async fn resolve(self, embedder: &dyn Embedder) -> Result<Vec<f32>> {
        match self {
            PaperInput::Embedding(embedding) => Ok(embedding),
            PaperInput::Text(text) => embedder.embed(&text).await,
        }
    }
}

/// Result of one masked inference run
#[derive(Debug, Clone)]
pub struct ColdStartOutput {
    /// Output row of the center node
    pub embedding: Array1<f32>,
    pub subgraph_nodes: usize,
    pub subgraph_edges: usize,
    /// Local index of the center inside the sampled subgraph
    pub center: usize,
    /// Global ids of the sampled subgraph, in local order
    pub node_ids: Vec<NodeId>,
}

/// Produces embeddings for papers from their citation neighbourhood
pub struct ColdStartEmbedder {
    graph: Arc<GraphStore>,
    model: Arc<dyn EmbeddingModel>,
    fanout: Vec<usize>,
}

impl ColdStartEmbedder {
    pub fn new(graph: Arc<GraphStore>, model: Arc<dyn EmbeddingModel>, fanout: Vec<usize>) -> Result<Self> {
        if graph.feature_dim() != model.input_dim() {
            return Err(AppError::DimensionMismatch {
                what: "model input".to_string(),
                expected: graph.feature_dim(),
                actual: model.input_dim(),
            });
        }
        if fanout.is_empty() {
            tracing::warn!("Empty fan-out: every subgraph will hold only its center node");
        }

        Ok(Self { graph, model, fanout })
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn fanout(&self) -> &[usize] {
        &self.fanout
    }

    pub fn output_dim(&self) -> usize {
        self.model.output_dim()
    }

    /// Embed a paper that is not in the graph yet.
    ///
    /// `cited_node_ids` must all be valid node ids; the call aborts with
    /// `OutOfRangeReference` otherwise. An empty list is legal and embeds
    /// the paper from the mask token alone.
    pub fn infer<R: Rng + ?Sized>(
        &self,
        cited_node_ids: &[i64],
        paper_embedding: &[f32],
        rng: &mut R,
    ) -> Result<ColdStartOutput> {
        let start = Instant::now();
        let embedding = Array1::from(paper_embedding.to_vec());

        let result = build_query_graph(self.graph.as_ref(), cited_node_ids, embedding.view(), &self.fanout, rng)
            .and_then(|subgraph| self.run_masked(subgraph));

        self.finish(start, cited_node_ids.len(), result)
    }

    /// Re-embed an existing node through the same masked path
    pub fn infer_existing<R: Rng + ?Sized>(&self, node: NodeId, rng: &mut R) -> Result<ColdStartOutput> {
        let start = Instant::now();

        let result = sample_neighborhood(self.graph.as_ref(), node, &self.fanout, rng)
            .and_then(|subgraph| self.run_masked(subgraph));

        self.finish(start, self.graph.reference_count(node), result)
    }

    fn run_masked(&self, mut subgraph: Subgraph) -> Result<ColdStartOutput> {
        subgraph.mask_center(self.model.mask_token())?;

        let output = self.model.infer(subgraph.features(), subgraph.edges())?;
        if output.nrows() != subgraph.num_nodes() {
            return Err(AppError::inference(format!(
                "model returned {} rows for {} nodes",
                output.nrows(),
                subgraph.num_nodes()
            )));
        }

        let center = subgraph.center();
        Ok(ColdStartOutput {
            embedding: output.row(center).to_owned(),
            subgraph_nodes: subgraph.num_nodes(),
            subgraph_edges: subgraph.num_edges(),
            center,
            node_ids: subgraph.node_ids().to_vec(),
        })
    }

    fn finish(&self, start: Instant, citations: usize, result: Result<ColdStartOutput>) -> Result<ColdStartOutput> {
        let elapsed = start.elapsed();

        match &result {
            Ok(output) => {
                metrics::record_inference(elapsed.as_secs_f64(), output.subgraph_nodes, true);
                tracing::info!(
                    citations,
                    nodes = output.subgraph_nodes,
                    edges = output.subgraph_edges,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Inference complete"
                );
            }
            Err(e) => {
                metrics::record_inference(elapsed.as_secs_f64(), 0, false);
                tracing::warn!(citations, error = %e, "Inference failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SageModel;
    use ariadne_common::embeddings::MockEmbedder;
    use ::metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, SharedString, Unit};
    use ndarray::{array, Array2, ArrayView1, ArrayView2};
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Identity model that records what it was fed
    struct SpyModel {
        mask: Array1<f32>,
        seen: Mutex<Option<Array2<f32>>>,
    }

    impl SpyModel {
        fn new(mask: Array1<f32>) -> Self {
            Self { mask, seen: Mutex::new(None) }
        }
    }

    impl EmbeddingModel for SpyModel {
        fn input_dim(&self) -> usize {
            self.mask.len()
        }

        fn output_dim(&self) -> usize {
            self.mask.len()
        }

        fn mask_token(&self) -> ArrayView1<'_, f32> {
            self.mask.view()
        }

        fn infer(&self, features: ArrayView2<'_, f32>, _edges: &[(usize, usize)]) -> Result<Array2<f32>> {
            *self.seen.lock().unwrap() = Some(features.to_owned());
            Ok(features.to_owned())
        }
    }

    fn chain() -> Arc<GraphStore> {
        let features = Array2::from_shape_fn((5, 2), |(i, j)| (i * 10 + j) as f32);
        Arc::new(GraphStore::from_parts(features, &[(0, 1), (1, 2), (2, 3), (3, 4)]).unwrap())
    }

    #[test]
    fn test_center_masked_bit_for_bit() {
        let graph = chain();
        let mask = array![0.125f32, -7.5];
        let spy = Arc::new(SpyModel::new(mask.clone()));
        let embedder = ColdStartEmbedder::new(graph.clone(), spy.clone(), vec![2, 2]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let out = embedder.infer(&[2], &[99.0, 98.0], &mut rng).unwrap();

        // chain scenario: {2, 3, 5}, new paper last
        assert_eq!(out.node_ids, vec![NodeId(2), NodeId(3), NodeId(5)]);
        assert_eq!(out.center, 2);

        let seen = spy.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.row(2), mask);
        // other rows untouched
        assert_eq!(seen.row(0), graph.features(NodeId(2)));
        assert_eq!(seen.row(1), graph.features(NodeId(3)));
        // identity model returns the masked row
        assert_eq!(out.embedding, mask);
    }

    #[test]
    fn test_existing_node_masked_by_local_index() {
        let graph = chain();
        let mask = array![-1.0f32, -1.0];
        let spy = Arc::new(SpyModel::new(mask.clone()));
        let embedder = ColdStartEmbedder::new(graph.clone(), spy.clone(), vec![1]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let out = embedder.infer_existing(NodeId(3), &mut rng).unwrap();
        assert_eq!(out.node_ids, vec![NodeId(3), NodeId(4)]);
        assert_eq!(out.center, 0);

        let seen = spy.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.row(0), mask);
        assert_eq!(seen.row(1), graph.features(NodeId(4)));
    }

    #[test]
    fn test_empty_citations_degenerate_case() {
        let graph = chain();
        let model = Arc::new(SageModel::seeded(&[2, 4, 3], 9));
        let embedder = ColdStartEmbedder::new(graph, model, vec![10, 10, 5]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let out = embedder.infer(&[], &[1.0, 1.0], &mut rng).unwrap();
        assert_eq!(out.subgraph_nodes, 1);
        assert_eq!(out.subgraph_edges, 0);
        assert_eq!(out.embedding.len(), 3);
    }

    #[test]
    fn test_center_embedding_depends_on_citations() {
        let graph = chain();
        let model = Arc::new(SageModel::seeded(&[2, 4, 3], 9));
        let embedder = ColdStartEmbedder::new(graph, model, vec![10, 10, 5]).unwrap();

        let embed = |citations: &[i64]| {
            embedder
                .infer(citations, &[1.0, 1.0], &mut StdRng::seed_from_u64(0))
                .unwrap()
                .embedding
        };
        let first = embed(&[0]);
        let tail = embed(&[3, 4]);
        let none = embed(&[]);

        assert_ne!(first, tail);
        assert_ne!(first, none);
        assert_ne!(tail, none);
    }

    #[test]
    fn test_output_independent_of_new_paper_features() {
        // the center row is always masked, so its raw embedding cannot leak
        let graph = chain();
        let model = Arc::new(SageModel::seeded(&[2, 4, 3], 9));
        let embedder = ColdStartEmbedder::new(graph, model, vec![2, 2]).unwrap();

        let a = embedder.infer(&[1, 2], &[0.0, 0.0], &mut StdRng::seed_from_u64(1)).unwrap();
        let b = embedder.infer(&[1, 2], &[5.0, -5.0], &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a.embedding, b.embedding);
    }

    #[test]
    fn test_invalid_citation_aborts() {
        let embedder = ColdStartEmbedder::new(chain(), Arc::new(SageModel::seeded(&[2, 3], 1)), vec![2]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let err = embedder.infer(&[0, -1], &[0.0, 0.0], &mut rng).unwrap_err();
        assert!(matches!(err, AppError::OutOfRangeReference { id: -1, .. }));

        let err = embedder.infer(&[0], &[0.0, 0.0, 0.0], &mut rng).unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn test_model_dimension_checked_at_construction() {
        let result = ColdStartEmbedder::new(chain(), Arc::new(SageModel::seeded(&[3, 3], 1)), vec![2]);
        assert!(matches!(result, Err(AppError::DimensionMismatch { expected: 2, actual: 3, .. })));
    }

    #[tokio::test]
    async fn test_text_input_resolved_through_embedder() {
        let embedder = MockEmbedder::new(2);

        let raw = PaperInput::Embedding(vec![1.0, 2.0]).resolve(&embedder).await.unwrap();
        assert_eq!(raw, vec![1.0, 2.0]);

        let from_text = PaperInput::Text("graph neural networks".to_string())
            .resolve(&embedder)
            .await
            .unwrap();
        assert_eq!(from_text.len(), 2);
    }

    /// Stand-in provider that meters its own calls, as real providers do
    struct MeteredEmbedder;

    #[async_trait::async_trait]
    impl Embedder for MeteredEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            metrics::record_embedding(0.01, self.model_name(), true);
            Ok(vec![0.0, 1.0])
        }

        fn model_name(&self) -> &str {
            "metered"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Counts increments of the embedding request counter
    #[derive(Default)]
    struct EmbeddingCallRecorder {
        calls: Arc<CallCount>,
    }

    #[derive(Default)]
    struct CallCount(AtomicU64);

    impl ::metrics::CounterFn for CallCount {
        fn increment(&self, value: u64) {
            self.0.fetch_add(value, Ordering::Relaxed);
        }

        fn absolute(&self, value: u64) {
            self.0.store(value, Ordering::Relaxed);
        }
    }

    impl ::metrics::Recorder for EmbeddingCallRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() == metrics::metric_name("embedding_requests_total") {
                Counter::from_arc(self.calls.clone())
            } else {
                Counter::noop()
            }
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_text_input_metered_once() {
        let recorder = EmbeddingCallRecorder::default();

        let embedding = ::metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(PaperInput::Text("sparse attention".to_string()).resolve(&MeteredEmbedder))
        })
        .unwrap();

        assert_eq!(embedding, vec![0.0, 1.0]);
        assert_eq!(recorder.calls.0.load(Ordering::Relaxed), 1);
    }
}
