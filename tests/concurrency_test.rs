mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use helpers::*;
use mnemos::memory::search::SearchRequest;

#[test]
fn concurrent_adds_are_all_indexed() {
    let engine = Arc::new(tfidf_engine());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..25 {
                    engine
                        .add_memory(&format!("thread {t} note {i} about caching"), vec![], None)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.len().unwrap(), 100);
    let view = engine.compute_scores_and_connections(0.35).unwrap();
    assert_eq!(view.matrix.len(), 100);
}

#[test]
fn concurrent_reinforcement_loses_no_updates() {
    let engine = Arc::new(keyword_engine());
    let memories = add_all(&engine, &["alpha", "beta"]);
    let id = memories[0].id.clone();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    engine.reinforce(&id, Some(0.5)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_close(score_of(&engine, &id), 1.0 + 8.0 * 50.0 * 0.5);
    assert_close(score_of(&engine, &memories[1].id), 1.0);
}

#[test]
fn readers_never_observe_a_partial_batch() {
    let engine = Arc::new(keyword_engine());
    add_all(&engine, &["alpha", "beta", "gamma", "delta"]);
    let done = Arc::new(AtomicBool::new(false));

    // Every write touches all four memories by the same amount, so any consistent
    // view has four equal scores.
    let writer = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let request = SearchRequest::new("alpha beta gamma delta", 10, 0.2);
            for _ in 0..100 {
                let response = engine.search(&request).unwrap();
                assert_eq!(response.reinforced, 4);
                engine.recalculate_all_scores(0.35).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let memories = engine.get_all_memories_flat().unwrap();
                    let first = memories[0].score;
                    assert!(
                        memories.iter().all(|m| m.score == first),
                        "inconsistent scores observed: {:?}",
                        memories.iter().map(|m| m.score).collect::<Vec<_>>()
                    );

                    let view = engine.compute_scores_and_connections(0.35).unwrap();
                    let first = view.nodes[0].score;
                    assert!(view.nodes.iter().all(|m| m.score == first));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn recalculated_network_is_not_interleaved_with_reinforcement() {
    let engine = Arc::new(keyword_engine());
    add_all(&engine, &["alpha", "beta", "gamma", "delta"]);
    let done = Arc::new(AtomicBool::new(false));

    let searcher = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let request = SearchRequest::new("alpha beta gamma delta", 10, 0.2);
            while !done.load(Ordering::SeqCst) {
                engine.search(&request).unwrap();
            }
        })
    };

    for _ in 0..100 {
        let result = engine.recalculate_scores_and_connections(0.35).unwrap();
        // Single-word memories with no edges recalculate to zero; any search that
        // slipped in between would show up as a positive score.
        assert!(result.network.nodes.iter().all(|m| m.score == 0.0));
        assert!(result.report.scores.iter().all(|u| u.score == 0.0));
    }
    done.store(true, Ordering::SeqCst);
    searcher.join().unwrap();
}

#[test]
fn searches_and_deletes_interleave_safely() {
    let engine = Arc::new(tfidf_engine());
    let memories = add_all(
        &engine,
        &[
            "the cat sat on the mat",
            "a cat chased the mouse",
            "dogs bark at the mailman",
            "the mailman delivers letters",
            SMART,
            GENIUS,
        ],
    );

    let searcher = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for query in ["cat", "mailman", "smart", "the mat"].iter().cycle().take(200) {
                let response = engine.search(&SearchRequest::new(*query, 3, 0.1)).unwrap();
                assert!(response.persistence_error.is_none());
            }
        })
    };
    let deleter = {
        let engine = Arc::clone(&engine);
        let ids: Vec<String> = memories.iter().step_by(2).map(|m| m.id.clone()).collect();
        thread::spawn(move || {
            for id in ids {
                engine.delete_memory(&id).unwrap();
            }
        })
    };

    searcher.join().unwrap();
    deleter.join().unwrap();
    assert_eq!(engine.len().unwrap(), 3);
}
