mod helpers;

use std::collections::BTreeSet;

use helpers::*;
use mnemos::error::EngineError;
use mnemos::memory::scores::graph_score;
use mnemos::memory::search::SearchRequest;

const SENTENCES: &[&str] = &[
    "the cat sat on the mat",
    "a cat chased the mouse across the mat",
    "dogs bark at the mailman every morning",
    "the mailman delivers letters every morning",
    "rust ownership prevents data races",
    "data races are prevented by ownership in rust",
];

fn edge_set(engine: &mnemos::memory::MemoryEngine, threshold: f64) -> BTreeSet<(String, String)> {
    engine
        .compute_scores_and_connections(threshold)
        .unwrap()
        .graph
        .edges()
        .into_iter()
        .map(|e| (e.source, e.target))
        .collect()
}

#[test]
fn similarity_matrix_is_symmetric_and_bounded() {
    let engine = tfidf_engine();
    add_all(&engine, SENTENCES);

    let view = engine.compute_scores_and_connections(0.35).unwrap();
    let matrix = &view.matrix;
    assert_eq!(matrix.len(), SENTENCES.len());

    for i in 0..matrix.len() {
        assert_eq!(matrix.get(i, i), None, "no self-similarity entry");
        for j in 0..matrix.len() {
            if i == j {
                continue;
            }
            let sim = matrix.get(i, j).unwrap();
            assert_eq!(Some(sim), matrix.get(j, i), "matrix must be symmetric");
            assert!((0.0..=1.0).contains(&sim), "similarity {sim} out of range");
        }
    }
}

#[test]
fn graph_edges_are_undirected_with_matching_weights() {
    let engine = tfidf_engine();
    add_all(&engine, SENTENCES);

    let view = engine.compute_scores_and_connections(0.2).unwrap();
    assert!(view.graph.edge_count() > 0);
    for edge in view.graph.edges() {
        let back = view
            .graph
            .neighbors_of(&edge.target)
            .unwrap()
            .iter()
            .find(|n| view.graph.ids()[n.index] == edge.source)
            .expect("edge missing from target adjacency");
        assert_eq!(back.weight, edge.weight);
        assert!(edge.weight >= 0.2);
        assert_eq!(Some(edge.weight), view.matrix.between(&edge.source, &edge.target));
    }
}

#[test]
fn raising_the_threshold_only_removes_edges() {
    let engine = tfidf_engine();
    add_all(&engine, SENTENCES);

    let thresholds = [0.0, 0.1, 0.2, 0.35, 0.5, 0.8, 1.0];
    for pair in thresholds.windows(2) {
        let looser = edge_set(&engine, pair[0]);
        let stricter = edge_set(&engine, pair[1]);
        assert!(
            stricter.is_subset(&looser),
            "edges at {} must be a subset of edges at {}",
            pair[1],
            pair[0]
        );
    }
}

#[test]
fn zero_threshold_connects_every_pair() {
    let engine = tfidf_engine();
    let memories = add_all(&engine, &[SMART, PIZZA]);

    let view = engine.compute_scores_and_connections(0.0).unwrap();
    assert_eq!(view.graph.edge_count(), 1, "sim >= 0 holds for every pair");
    let edge = &view.graph.edges()[0];
    assert_eq!(edge.weight, 0.0);
    assert_eq!(
        (edge.source.as_str(), edge.target.as_str()),
        (memories[0].id.as_str(), memories[1].id.as_str())
    );

    assert_eq!(engine.compute_scores_and_connections(0.01).unwrap().graph.edge_count(), 0);
}

#[test]
fn recalculation_at_zero_threshold_awards_the_hub_bonus() {
    let engine = keyword_engine();
    let memories = add_all(&engine, &["alpha", "beta", "gamma", "delta"]);

    let report = engine.recalculate_all_scores(0.0).unwrap();
    assert_eq!(report.edges, 6);
    // Degree 3 with zero-weight edges: only the 0.1 * degree bonus remains.
    for memory in &memories {
        assert_close(score_of(&engine, &memory.id), 0.3);
    }
}

#[test]
fn empty_corpus_has_an_empty_network() {
    let engine = tfidf_engine();
    let view = engine.compute_scores_and_connections(0.35).unwrap();
    assert!(view.nodes.is_empty());
    assert!(view.matrix.is_empty());
    assert!(view.graph.is_empty());

    let report = engine.recalculate_all_scores(0.35).unwrap();
    assert!(report.scores.is_empty());
    assert_eq!(report.edges, 0);
}

#[test]
fn single_memory_has_no_edges() {
    let engine = tfidf_engine();
    let memories = add_all(&engine, &[SMART]);

    let view = engine.compute_scores_and_connections(0.0).unwrap();
    assert_eq!(view.nodes.len(), 1);
    assert_eq!(view.matrix.len(), 1);
    assert_eq!(view.graph.edge_count(), 0);
    assert_eq!(view.graph.neighbors_of(&memories[0].id).unwrap().len(), 0);
}

#[test]
fn threshold_outside_unit_interval_is_rejected() {
    let engine = tfidf_engine();
    add_all(&engine, &[SMART]);

    for threshold in [-0.1, 1.5, f64::NAN] {
        let err = engine.compute_scores_and_connections(threshold).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)), "got {err:?}");
        let err = engine.recalculate_all_scores(threshold).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)), "got {err:?}");
    }
}

#[test]
fn recalculation_derives_scores_from_the_graph() {
    let engine = keyword_engine();
    let memories = add_all(&engine, &["rust graph", "memory graph", "graph", "pizza"]);
    engine.reinforce(&memories[3].id, Some(10.0)).unwrap();

    let report = engine.recalculate_all_scores(0.35).unwrap();
    assert_eq!(report.scores.len(), 4);
    assert_eq!(report.edges, 3);

    let view = engine.compute_scores_and_connections(0.35).unwrap();
    for node in &view.nodes {
        let words = node.content.split_whitespace().count();
        let expected = graph_score(view.graph.neighbors_of(&node.id).unwrap(), words);
        assert_close(node.score, expected);
    }

    // Two strong (>= 0.7) edges of similarity 1/sqrt(2), each counted triple.
    let shared = score_of(&engine, &memories[2].id);
    assert!((shared - 6.0 / 2f64.sqrt()).abs() < 1e-6, "got {shared}");
    assert_close(score_of(&engine, &memories[3].id), 0.0);
}

#[test]
fn recalculation_discards_reinforcement_and_reinforcement_resumes() {
    let engine = tfidf_engine();
    let memories = add_all(&engine, &[SMART, GENIUS, PIZZA]);
    engine.search(&SearchRequest::new("Am I smart?", 3, 0.2)).unwrap();
    engine.reinforce(&memories[2].id, Some(4.0)).unwrap();

    engine.recalculate_all_scores(0.35).unwrap();
    // Short, unconnected memories have no structural score.
    for memory in &memories {
        assert_close(score_of(&engine, &memory.id), 0.0);
    }

    engine.reinforce(&memories[0].id, None).unwrap();
    assert_close(score_of(&engine, &memories[0].id), 1.0);
    assert_close(score_of(&engine, &memories[1].id), 0.0);
}

#[test]
fn long_content_earns_a_length_bonus() {
    let engine = keyword_engine();
    let memories = add_all(
        &engine,
        &[
            "one two three four five",
            "one two three four five six seven eight nine ten",
        ],
    );

    engine.recalculate_all_scores(0.35).unwrap();
    assert_close(score_of(&engine, &memories[0].id), 0.1);
    assert_close(score_of(&engine, &memories[1].id), 0.2);
}

#[test]
fn deleted_memory_leaves_every_structure() {
    let engine = tfidf_engine();
    let memories = add_all(&engine, &[SMART, GENIUS, PIZZA]);

    let deleted = engine.delete_memory(&memories[0].id).unwrap();
    assert_eq!(deleted.content, SMART);
    assert_eq!(engine.len().unwrap(), 2);

    let view = engine.compute_scores_and_connections(0.0).unwrap();
    assert!(view.nodes.iter().all(|m| m.id != memories[0].id));
    assert!(view.matrix.index_of(&memories[0].id).is_none());
    assert!(view.graph.neighbors_of(&memories[0].id).is_none());

    let response = engine.search(&SearchRequest::new("smart", 10, 0.0)).unwrap();
    assert!(response.results.iter().all(|h| h.memory.id != memories[0].id));

    let err = engine.delete_memory(&memories[0].id).unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
