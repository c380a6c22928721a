//! Atomic counters backing [`crate::search::DatabaseStats`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::search::DatabaseStats;

/// Lock-free running counters updated on the hot insert/search paths.
pub struct Stats {
    total_inserts: AtomicU64,
    total_queries: AtomicU64,
    total_query_time_micros: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_inserts: AtomicU64::new(0),
            total_queries: AtomicU64::new(0),
            total_query_time_micros: AtomicU64::new(0),
        }
    }

    pub fn record_insert(&self) {
        self.total_inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self, elapsed_ms: f64) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.total_query_time_micros.fetch_add((elapsed_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, vector_count: usize, dimension: usize, index_memory_bytes: usize, total_memory_bytes: usize) -> DatabaseStats {
        let total_queries = self.total_queries.load(Ordering::Relaxed);
        let total_micros = self.total_query_time_micros.load(Ordering::Relaxed);
        let avg_query_time_ms = if total_queries == 0 { 0.0 } else { (total_micros as f64 / total_queries as f64) / 1000.0 };

        DatabaseStats {
            vector_count,
            dimension,
            total_inserts: self.total_inserts.load(Ordering::Relaxed),
            total_queries,
            avg_query_time_ms,
            index_memory_bytes,
            total_memory_bytes,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
