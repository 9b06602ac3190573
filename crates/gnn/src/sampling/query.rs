//! Cold-start query graph construction

use super::{sample_neighborhood, Subgraph};
use crate::graph::{CitationGraph, ExtendedGraph};
use ariadne_common::errors::Result;
use ndarray::ArrayView1;
use rand::Rng;

/// Place a new paper into `graph` and sample its neighbourhood.
///
/// The paper becomes node `graph.num_nodes()` with one edge per entry of
/// `cited_node_ids` (duplicates give parallel edges). The returned subgraph
/// always contains the new paper as its center; its node ids map local rows
/// back to ids of the extended graph, where the new paper is the only id
/// `>= graph.num_nodes()`.
pub fn build_query_graph<G, R>(
    graph: &G,
    cited_node_ids: &[i64],
    new_paper_embedding: ArrayView1<'_, f32>,
    fanout: &[usize],
    rng: &mut R,
) -> Result<Subgraph>
where
    G: CitationGraph + ?Sized,
    R: Rng + ?Sized,
{
    let extended = ExtendedGraph::new(graph, cited_node_ids, new_paper_embedding)?;
    sample_neighborhood(&extended, extended.new_node(), fanout, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphStore, NodeId};
    use ariadne_common::errors::AppError;
    use ndarray::{array, Array1, Array2};
    use rand::{rngs::StdRng, SeedableRng};

    fn chain() -> GraphStore {
        let features = Array2::from_shape_fn((5, 2), |(i, _)| i as f32);
        GraphStore::from_parts(features, &[(0, 1), (1, 2), (2, 3), (3, 4)]).unwrap()
    }

    #[test]
    fn test_chain_scenario() {
        let graph = chain();
        let embedding = array![9.0f32, 9.0];
        let mut rng = StdRng::seed_from_u64(0);

        let sub = build_query_graph(&graph, &[2], embedding.view(), &[2, 2], &mut rng).unwrap();

        // new paper 5 -> 2, then 2 -> 3
        assert_eq!(sub.node_ids(), &[NodeId(2), NodeId(3), NodeId(5)]);
        assert_eq!(sub.center(), 2);
        assert_eq!(sub.center_id(), NodeId(5));
        assert_eq!(sub.edges(), &[(0, 1), (2, 0)]);
        assert_eq!(sub.features().row(2), embedding);
    }

    #[test]
    fn test_center_always_present() {
        let graph = chain();
        let embedding = Array1::<f32>::zeros(2);

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let sub = build_query_graph(&graph, &[0, 1, 2, 3, 4], embedding.view(), &[2, 1], &mut rng)
                .unwrap();
            assert!(sub.center() < sub.num_nodes());
            assert_eq!(sub.center_id(), NodeId(5));
            assert_eq!(sub.node_ids().iter().filter(|&&n| n == NodeId(5)).count(), 1);
        }
    }

    #[test]
    fn test_empty_citations_single_node() {
        let graph = chain();
        let embedding = Array1::<f32>::zeros(2);
        let mut rng = StdRng::seed_from_u64(0);

        let sub = build_query_graph(&graph, &[], embedding.view(), &[10, 10, 5], &mut rng).unwrap();
        assert_eq!(sub.node_ids(), &[NodeId(5)]);
        assert_eq!(sub.num_edges(), 0);
        assert_eq!(sub.center(), 0);
    }

    #[test]
    fn test_duplicate_citations_make_parallel_edges() {
        let graph = chain();
        let embedding = Array1::<f32>::zeros(2);
        let mut rng = StdRng::seed_from_u64(0);

        let sub = build_query_graph(&graph, &[4, 4], embedding.view(), &[3], &mut rng).unwrap();
        assert_eq!(sub.node_ids(), &[NodeId(4), NodeId(5)]);
        assert_eq!(sub.edges(), &[(1, 0), (1, 0)]);
    }

    #[test]
    fn test_invalid_citation_aborts() {
        let graph = chain();
        let embedding = Array1::<f32>::zeros(2);
        let mut rng = StdRng::seed_from_u64(0);

        let err = build_query_graph(&graph, &[1, 7], embedding.view(), &[2], &mut rng).unwrap_err();
        assert!(matches!(err, AppError::OutOfRangeReference { id: 7, num_nodes: 5 }));
    }
}
