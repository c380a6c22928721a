//! Literal end-to-end scenarios: empty search, single-vector self search,
//! nearest-neighbor ordering with an outlier, a save/load round trip,
//! repeated entry-point removal, and concurrent readers/writer through
//! index maintenance.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use lynxdb::{Config, Database, DistanceMetric, SearchParams, Vector};

fn random_vector(dim: usize, seed: u64) -> Vec<f32> {
    (0..dim).map(|i| ((seed.wrapping_mul(2654435761).wrapping_add(i as u64 * 40503)) % 2000) as f32 / 100.0 - 10.0).collect()
}

/// An empty HNSW index returns no hits and zero candidates.
#[test]
fn search_on_empty_index_returns_nothing() {
    let db = Database::create(Config::new(4, DistanceMetric::L2)).unwrap();
    let result = db.search(&[0.0, 0.0, 0.0, 0.0], 5, &SearchParams::none()).unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.total_candidates, 0);
}

/// A single inserted vector is found at distance zero from itself.
#[test]
fn single_insert_then_self_search() {
    let db = Database::create(Config::new(4, DistanceMetric::L2)).unwrap();
    db.insert(1, Vector::new(vec![1.0, 0.0, 0.0, 0.0])).unwrap();

    let result = db.search(&[1.0, 0.0, 0.0, 0.0], 5, &SearchParams::none()).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].id, 1);
    assert!(result.items[0].distance.abs() < 1e-6);

    assert!(db.contains(1));
    assert!(!db.contains(2));
}

/// The nearer three of four points are returned, in distance order, with
/// the outlier excluded.
#[test]
fn nearest_three_exclude_the_outlier() {
    let db = Database::create(Config::new(2, DistanceMetric::L2)).unwrap();
    db.insert(1, Vector::new(vec![0.0, 0.0])).unwrap();
    db.insert(2, Vector::new(vec![1.0, 0.0])).unwrap();
    db.insert(3, Vector::new(vec![0.0, 1.0])).unwrap();
    db.insert(4, Vector::new(vec![10.0, 10.0])).unwrap();

    let result = db.search(&[0.1, 0.1], 3, &SearchParams::none()).unwrap();
    assert_eq!(result.items.len(), 3);
    assert_eq!(result.items[0].id, 1);

    let rest: HashSet<_> = result.items[1..].iter().map(|h| h.id).collect();
    assert_eq!(rest, HashSet::from([2, 3]));
    assert!(!result.items.iter().any(|h| h.id == 4));
}

/// A save/load round trip preserves exact top-10 results for a fixed set
/// of queries against a fixed, seeded dataset.
#[test]
fn save_load_round_trip_preserves_query_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(32, DistanceMetric::L2).with_data_path(dir.path());
    let db = Database::create(config).unwrap();

    for i in 0..100u64 {
        db.insert(i, Vector::new(random_vector(32, 42 + i))).unwrap();
    }

    let queries: Vec<Vec<f32>> = (0..10u64).map(|i| random_vector(32, 1000 + i)).collect();
    let before: Vec<Vec<u64>> = queries
        .iter()
        .map(|q| db.search(q, 10, &SearchParams::none()).unwrap().items.iter().map(|h| h.id).collect())
        .collect();

    db.save(dir.path()).unwrap();
    let loaded = Database::load(dir.path()).unwrap();

    let after: Vec<Vec<u64>> = queries
        .iter()
        .map(|q| loaded.search(q, 10, &SearchParams::none()).unwrap().items.iter().map(|h| h.id).collect())
        .collect();

    assert_eq!(before, after);
}

/// Repeatedly removing the current entry point leaves the HNSW graph in a
/// consistent state, with the new entry always among the survivors.
#[test]
fn repeated_entry_point_removal_stays_consistent() {
    let db = Database::create(Config::new(2, DistanceMetric::L2)).unwrap();
    for i in 0..50u64 {
        db.insert(i, Vector::new(vec![i as f32, (i % 11) as f32])).unwrap();
    }

    while db.size() >= 10 {
        let probe = db.search(&[0.0, 0.0], 1, &SearchParams::none()).unwrap();
        let entry = probe.items[0].id;
        assert!(db.contains(entry));
        db.remove(entry).unwrap();
        assert!(!db.contains(entry));
    }

    assert!(db.size() >= 9);
}

/// A writer inserting a batch of vectors concurrently with many readers,
/// bracketed by `optimize_index`, commits every write and never surfaces a
/// read error.
#[test]
fn concurrent_writer_and_readers_survive_optimize() {
    let db = Arc::new(Database::create(Config::new(8, DistanceMetric::L2)).unwrap());

    for i in 0..200u64 {
        db.insert(i, Vector::new(random_vector(8, i))).unwrap();
    }

    let writer_db = Arc::clone(&db);
    let writer = thread::spawn(move || {
        for i in 200..700u64 {
            writer_db.insert(i, Vector::new(random_vector(8, i))).unwrap();
        }
    });

    let mut searchers = Vec::new();
    for t in 0..8u64 {
        let search_db = Arc::clone(&db);
        searchers.push(thread::spawn(move || {
            for i in 0..50u64 {
                let query = random_vector(8, t * 1000 + i);
                search_db.search(&query, 5, &SearchParams::none()).unwrap();
            }
        }));
    }

    let optimize_db = Arc::clone(&db);
    let optimizer = thread::spawn(move || {
        // Either outcome is acceptable: successful maintenance, or a clean
        // abort because the write log outran the rebuild.
        let _ = optimize_db.optimize_index();
    });

    writer.join().unwrap();
    for s in searchers {
        s.join().unwrap();
    }
    optimizer.join().unwrap();

    assert_eq!(db.size(), 700);
    for i in 0..700u64 {
        assert!(db.contains(i));
    }
}
