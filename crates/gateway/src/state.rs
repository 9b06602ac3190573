//! Shared application state, built once at startup

use ariadne_common::{
    catalog::PaperCatalog,
    config::AppConfig,
    embeddings::{create_embedder, Embedder},
    errors::{AppError, Result},
    history::HistoryStore,
    metrics::metric_name,
};
use ariadne_gnn::{
    model::EmbeddingModel, CitationGraph, ColdStartEmbedder, CorpusIndex, GraphStore, SageModel,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub embedder: Arc<ColdStartEmbedder>,
    pub index: Arc<CorpusIndex>,
    pub catalog: Arc<PaperCatalog>,
    pub history: Arc<HistoryStore>,
    pub text_embedder: Arc<dyn Embedder>,
    seeder: Arc<Mutex<StdRng>>,
}

impl AppState {
    /// Load every data file named in the config
    pub fn load(config: AppConfig) -> Result<Self> {
        let data = &config.data;

        let graph = Arc::new(GraphStore::load(&data.graph_path)?);
        let model: Arc<dyn EmbeddingModel> = Arc::new(SageModel::load(&data.model_path)?);
        let index = Arc::new(CorpusIndex::load(&data.corpus_path)?);
        let catalog = Arc::new(PaperCatalog::load(&data.catalog_path)?);
        let text_embedder = create_embedder(&config.embedding)?;

        Self::new(config, graph, model, index, catalog, text_embedder)
    }

    /// Assemble state from loaded parts, checking they fit together
    pub fn new(
        config: AppConfig,
        graph: Arc<GraphStore>,
        model: Arc<dyn EmbeddingModel>,
        index: Arc<CorpusIndex>,
        catalog: Arc<PaperCatalog>,
        text_embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if index.len() != graph.num_nodes() {
            return Err(AppError::DimensionMismatch {
                what: "corpus rows".to_string(),
                expected: graph.num_nodes(),
                actual: index.len(),
            });
        }
        if index.dim() != model.output_dim() {
            return Err(AppError::DimensionMismatch {
                what: "corpus embedding width".to_string(),
                expected: model.output_dim(),
                actual: index.dim(),
            });
        }
        if text_embedder.dimension() != graph.feature_dim() {
            return Err(AppError::DimensionMismatch {
                what: "text embedding width".to_string(),
                expected: graph.feature_dim(),
                actual: text_embedder.dimension(),
            });
        }

        let embedder = ColdStartEmbedder::new(graph.clone(), model, config.gnn.fanout.clone())?;

        let seeder = match config.gnn.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        ::metrics::gauge!(metric_name("graph_nodes")).set(graph.num_nodes() as f64);
        ::metrics::gauge!(metric_name("graph_edges")).set(graph.num_edges() as f64);
        ::metrics::gauge!(metric_name("catalog_papers")).set(catalog.len() as f64);

        tracing::info!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            corpus = index.len(),
            catalog = catalog.len(),
            fanout = ?config.gnn.fanout,
            seeded = config.gnn.seed.is_some(),
            "Serving state ready"
        );

        Ok(Self {
            history: Arc::new(HistoryStore::new(config.recommend.history_cap, config.recommend.max_users)),
            config: Arc::new(config),
            embedder: Arc::new(embedder),
            index,
            catalog,
            text_embedder,
            seeder: Arc::new(Mutex::new(seeder)),
        })
    }

    /// Fresh RNG for one request, derived from the shared seeder so a
    /// configured seed makes a request sequence reproducible
    pub fn request_rng(&self) -> StdRng {
        let mut seeder = self.seeder.lock().unwrap_or_else(PoisonError::into_inner);
        StdRng::seed_from_u64(seeder.gen())
    }
}

#[cfg(test)]
pub fn test_state() -> AppState {
    use ariadne_common::{catalog::PaperRecord, embeddings::MockEmbedder};
    use ariadne_gnn::model::{SageLayerWeights, SageWeights};
    use ndarray::{array, Array2};

    // 0 -> 1 -> 2 -> 3 -> 4
    let features = Array2::from_shape_fn((5, 2), |(i, j)| (i + j) as f32 * 0.1);
    let graph = GraphStore::from_parts(features, &[(0, 1), (1, 2), (2, 3), (3, 4)]).unwrap();

    let model = SageModel::from_weights(SageWeights {
        mask_token: vec![0.05, -0.05],
        layers: vec![SageLayerWeights {
            lin_l_weight: vec![vec![0.9, 0.1], vec![0.2, 0.8]],
            lin_l_bias: vec![0.01, 0.02],
            lin_r_weight: vec![vec![0.3, 0.0], vec![0.0, 0.3]],
            batch_norm: None,
        }],
    })
    .unwrap();

    let index = CorpusIndex::new(array![[1.0f32, 0.0], [0.9, 0.1], [0.5, 0.5], [0.1, 0.9], [0.0, 1.0]]);

    let catalog = PaperCatalog::from_records((0..5).map(|i| PaperRecord {
        node_id: i,
        mag_id: Some(format!("W10{}", i)),
        title: Some(format!("Paper {}", i)),
    }));

    let mut config = AppConfig::default();
    config.gnn.fanout = vec![2, 2];
    config.gnn.seed = Some(7);

    AppState::new(
        config,
        Arc::new(graph),
        Arc::new(model),
        Arc::new(index),
        Arc::new(catalog),
        Arc::new(MockEmbedder::new(2)),
    )
    .unwrap()
}
