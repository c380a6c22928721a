//! Query-time types: results, per-query overrides, and aggregate stats.

use std::sync::Arc;

use crate::vector::VectorId;

/// A single (id, distance) hit, ascending-by-distance within a
/// [`SearchResult::items`] list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredId {
    /// The matched vector's id.
    pub id: VectorId,
    /// Distance under the database's configured metric. Smaller is closer.
    pub distance: f32,
}

/// The outcome of a `Database::search` call.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Hits, ascending by distance, at most `k` long.
    pub items: Vec<ScoredId>,
    /// How many vectors were in scope of the search (the index's size at
    /// query time — the façade's own timer is authoritative, this field
    /// documents scope, not cost).
    pub total_candidates: usize,
    /// Wall-clock time the façade spent inside the index call, in
    /// milliseconds.
    pub query_time_ms: f64,
}

impl SearchResult {
    /// An empty result, as returned for dimension-mismatched or empty-index
    /// queries.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_candidates: 0,
            query_time_ms: 0.0,
        }
    }
}

/// A boxed, thread-safe id predicate used to filter search candidates.
///
/// Must be a pure function of its input: it may be invoked concurrently by
/// multiple readers and must not observe or mutate shared state that isn't
/// itself synchronized.
pub type IdFilter = Arc<dyn Fn(VectorId) -> bool + Send + Sync>;

/// Per-query overrides layered on top of [`crate::config::Config`] defaults.
#[derive(Clone, Default)]
pub struct SearchParams {
    /// Overrides `Config::hnsw.ef_search` for this query only.
    pub ef_search: Option<usize>,
    /// Overrides `Config::ivf.n_probe` for this query only.
    pub n_probe: Option<usize>,
    /// Optional id predicate. Rejected candidates are dropped from the
    /// final set without re-expansion, so fewer than `k` items may come
    /// back.
    pub filter: Option<IdFilter>,
}

impl std::fmt::Debug for SearchParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParams")
            .field("ef_search", &self.ef_search)
            .field("n_probe", &self.n_probe)
            .field("filter", &self.filter.as_ref().map(|_| "Fn(..)"))
            .finish()
    }
}

impl SearchParams {
    /// No overrides, no filter.
    pub fn none() -> Self {
        Self::default()
    }

    /// Applies `filter` to `id`, defaulting to `true` (accept) when no
    /// filter was set.
    pub fn accepts(&self, id: VectorId) -> bool {
        match &self.filter {
            Some(f) => f(id),
            None => true,
        }
    }
}

/// A point-in-time snapshot of database counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatabaseStats {
    /// Number of vectors currently stored.
    pub vector_count: usize,
    /// Configured dimension.
    pub dimension: usize,
    /// Lifetime count of successful inserts.
    pub total_inserts: u64,
    /// Lifetime count of searches.
    pub total_queries: u64,
    /// Mean wall-clock search time, in milliseconds.
    pub avg_query_time_ms: f64,
    /// Estimated bytes held by the active index.
    pub index_memory_bytes: usize,
    /// Estimated total bytes (index + vector store).
    pub total_memory_bytes: usize,
}
