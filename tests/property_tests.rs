//! Property-based tests for the database façade's observable invariants:
//! id/containment agreement, self-distance, save/load round trips,
//! result-count and ordering bounds, and IVF list bookkeeping.

use std::collections::HashSet;

use proptest::prelude::*;

use lynxdb::{Config, Database, DistanceMetric, SearchParams, Vector, VectorId, VectorRecord};

fn vector_strategy(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-10.0f32..10.0f32, dim..=dim)
}

fn id_strategy() -> impl Strategy<Value = VectorId> {
    1u64..10_000u64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every stored id is reachable through the database: the vector store
    /// and the index agree on membership.
    #[test]
    fn every_inserted_id_is_contained(
        entries in prop::collection::vec((id_strategy(), vector_strategy(8)), 1..40)
    ) {
        let db = Database::create(Config::new(8, DistanceMetric::L2)).unwrap();
        let mut expected = HashSet::new();

        for (id, vector) in entries {
            if expected.contains(&id) {
                continue;
            }
            db.insert(id, Vector::new(vector)).unwrap();
            expected.insert(id);
        }

        for id in &expected {
            prop_assert!(db.contains(*id));
        }
        prop_assert_eq!(db.size(), expected.len());
    }

    /// Every metric reports a non-positive (or near-zero) self-distance for
    /// a non-zero vector.
    #[test]
    fn self_distance_is_minimal(vector in vector_strategy(16).prop_filter("non-zero", |v| v.iter().any(|&x| x != 0.0))) {
        let db = Database::create(Config::new(16, DistanceMetric::L2)).unwrap();
        db.insert(1, Vector::new(vector.clone())).unwrap();

        let result = db.search(&vector, 1, &SearchParams::none()).unwrap();
        prop_assert_eq!(result.items[0].id, 1);
        prop_assert!(result.items[0].distance <= 1e-3);
    }

    /// Property: search never returns more than `k` items.
    #[test]
    fn search_returns_at_most_k(
        query in vector_strategy(12),
        entries in prop::collection::vec((id_strategy(), vector_strategy(12)), 5..60),
        k in 1usize..15usize
    ) {
        let db = Database::create(Config::new(12, DistanceMetric::Cosine)).unwrap();
        let mut seen = HashSet::new();
        for (id, vector) in entries {
            if seen.insert(id) {
                db.insert(id, Vector::new(vector)).unwrap();
            }
        }

        let result = db.search(&query, k, &SearchParams::none()).unwrap();
        prop_assert!(result.items.len() <= k);
    }

    /// Property: search results are sorted ascending by distance.
    #[test]
    fn search_results_are_sorted(
        query in vector_strategy(10),
        entries in prop::collection::vec((id_strategy(), vector_strategy(10)), 5..50)
    ) {
        let db = Database::create(Config::new(10, DistanceMetric::L2)).unwrap();
        let mut seen = HashSet::new();
        for (id, vector) in entries {
            if seen.insert(id) {
                db.insert(id, Vector::new(vector)).unwrap();
            }
        }

        let result = db.search(&query, 10, &SearchParams::none()).unwrap();
        for window in result.items.windows(2) {
            prop_assert!(window[0].distance <= window[1].distance);
        }
    }

    /// A serialize/deserialize round trip preserves size and per-query
    /// results.
    #[test]
    fn round_trip_preserves_search_results(
        entries in prop::collection::vec((id_strategy(), vector_strategy(8)), 10..60),
        query in vector_strategy(8)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(8, DistanceMetric::L2).with_data_path(dir.path());
        let db = Database::create(config).unwrap();

        let mut seen = HashSet::new();
        for (id, vector) in entries {
            if seen.insert(id) {
                db.insert(id, Vector::new(vector)).unwrap();
            }
        }

        db.save(dir.path()).unwrap();
        let loaded = Database::load(dir.path()).unwrap();

        prop_assert_eq!(loaded.size(), db.size());

        let before = db.search(&query, 5, &SearchParams::none()).unwrap();
        let after = loaded.search(&query, 5, &SearchParams::none()).unwrap();
        prop_assert_eq!(before.items.len(), after.items.len());
        for (b, a) in before.items.iter().zip(after.items.iter()) {
            prop_assert_eq!(b.id, a.id);
            prop_assert!((b.distance - a.distance).abs() < 1e-4);
        }
    }
}

#[cfg(test)]
mod deterministic_tests {
    use super::*;

    #[test]
    fn remove_then_search_never_returns_the_removed_id() {
        let db = Database::create(Config::new(4, DistanceMetric::L2)).unwrap();
        for i in 0..20u64 {
            db.insert(i, Vector::new(vec![i as f32, 0.0, 0.0, 0.0])).unwrap();
        }
        db.remove(5).unwrap();

        let result = db.search(&[5.0, 0.0, 0.0, 0.0], 20, &SearchParams::none()).unwrap();
        assert!(!result.items.iter().any(|hit| hit.id == 5));
    }

    #[test]
    fn optimize_index_is_idempotent_on_search_results() {
        let db = Database::create(Config::new(4, DistanceMetric::L2)).unwrap();
        for i in 0..80u64 {
            db.insert(i, Vector::new(vec![i as f32, (i % 3) as f32, 0.0, 0.0])).unwrap();
        }

        let before = db.search(&[40.0, 1.0, 0.0, 0.0], 5, &SearchParams::none()).unwrap();
        db.optimize_index().unwrap();
        db.optimize_index().unwrap();
        let after = db.search(&[40.0, 1.0, 0.0, 0.0], 5, &SearchParams::none()).unwrap();

        let before_ids: HashSet<_> = before.items.iter().map(|h| h.id).collect();
        let after_ids: HashSet<_> = after.items.iter().map(|h| h.id).collect();
        assert_eq!(before_ids, after_ids);
    }

    #[test]
    fn ivf_list_sizes_sum_to_vector_count() {
        use lynxdb::{IndexKind, IvfParams};

        let config = Config::new(4, DistanceMetric::L2).with_index_type(IndexKind::Ivf).with_ivf(IvfParams { n_clusters: 4, n_probe: 4 });
        let db = Database::create(config).unwrap();

        let records: Vec<VectorRecord> = (0..100u64).map(|i| VectorRecord::new(i, Vector::new(vec![i as f32, 0.0, 0.0, 0.0]))).collect();
        db.batch_insert(records).unwrap();

        assert_eq!(db.size(), 100);
        let result = db.search(&[50.0, 0.0, 0.0, 0.0], 100, &SearchParams::none()).unwrap();
        assert_eq!(result.total_candidates <= 100, true);
    }
}
