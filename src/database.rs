//! The database façade tying configuration, vector storage, the active
//! index backend, the write log, and stats together.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::backend::IndexBackend;
use crate::config::{Config, IndexKind};
use crate::error::{Error, Result};
use crate::flat::FlatIndex;
use crate::hnsw::HnswIndex;
use crate::ivf::IvfIndex;
use crate::search::{DatabaseStats, SearchParams, SearchResult};
use crate::stats::Stats;
use crate::vector::{Vector, VectorId, VectorRecord};
use crate::write_log::WriteLog;

/// An embeddable approximate-nearest-neighbor vector database.
///
/// Holds the authoritative `id -> VectorRecord` store plus one active index
/// backend behind `index`. Readers pin the current backend with
/// [`Database::pin_index`] (a cheap `Arc` clone) so a concurrent
/// [`Database::optimize_index`] swap never invalidates an in-flight
/// operation.
pub struct Database {
    config: Config,
    vectors: RwLock<HashMap<VectorId, VectorRecord>>,
    index: RwLock<Arc<dyn IndexBackend>>,
    write_log: WriteLog,
    stats: Stats,
}

impl Database {
    /// Creates an empty database for `config`.
    pub fn create(config: Config) -> Result<Self> {
        let index = Self::build_backend(&config);
        Ok(Self {
            config,
            vectors: RwLock::new(HashMap::new()),
            index: RwLock::new(Arc::from(index)),
            write_log: WriteLog::new(),
            stats: Stats::new(),
        })
    }

    fn build_backend(config: &Config) -> Box<dyn IndexBackend> {
        match config.index_type {
            IndexKind::Flat => Box::new(FlatIndex::new(config.dimension, config.distance_metric)),
            IndexKind::Hnsw => Box::new(HnswIndex::new(config.dimension, config.distance_metric, config.hnsw)),
            IndexKind::Ivf => Box::new(IvfIndex::new(config.dimension, config.distance_metric, config.ivf)),
        }
    }

    fn pin_index(&self) -> Arc<dyn IndexBackend> {
        Arc::clone(&self.index.read().expect("index lock poisoned"))
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual,
            });
        }
        Ok(())
    }

    /// Inserts `vector` under `id`, with no metadata.
    pub fn insert(&self, id: VectorId, vector: Vector) -> Result<()> {
        self.insert_record(VectorRecord::new(id, vector))
    }

    /// Inserts `vector` under `id`, carrying opaque `metadata`.
    pub fn insert_with_metadata(&self, id: VectorId, vector: Vector, metadata: Vec<u8>) -> Result<()> {
        self.insert_record(VectorRecord::with_metadata(id, vector, metadata))
    }

    fn insert_record(&self, record: VectorRecord) -> Result<()> {
        self.check_dimension(record.vector.dim())?;
        {
            let vectors = self.vectors.read().expect("vector store lock poisoned");
            if vectors.contains_key(&record.id) {
                return Err(Error::InvalidParameter(format!("id {} already exists", record.id)));
            }
        }

        let idx = self.pin_index();
        idx.add(record.id, record.vector.as_slice())?;
        self.write_log.log_insert(record.id, record.vector.as_slice());

        self.vectors.write().expect("vector store lock poisoned").insert(record.id, record);
        self.stats.record_insert();
        Ok(())
    }

    /// Removes `id`. Returns `Err(VectorNotFound)` if absent.
    pub fn remove(&self, id: VectorId) -> Result<()> {
        let idx = self.pin_index();
        idx.remove(id)?;
        self.write_log.log_remove(id);
        self.vectors.write().expect("vector store lock poisoned").remove(&id);
        Ok(())
    }

    /// Whether `id` is currently stored.
    pub fn contains(&self, id: VectorId) -> bool {
        self.vectors.read().expect("vector store lock poisoned").contains_key(&id)
    }

    /// Fetches a clone of the stored record for `id`, if present.
    pub fn get(&self, id: VectorId) -> Option<VectorRecord> {
        self.vectors.read().expect("vector store lock poisoned").get(&id).cloned()
    }

    /// Clones of every currently stored record. Unordered.
    pub fn all_records(&self) -> Vec<VectorRecord> {
        self.vectors.read().expect("vector store lock poisoned").values().cloned().collect()
    }

    /// Finds up to `k` nearest neighbors of `query` under the configured
    /// metric.
    pub fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> Result<SearchResult> {
        self.check_dimension(query.len())?;

        let start = Instant::now();
        let idx = self.pin_index();
        let (items, total_candidates) = idx.search(query, k, params)?;
        let query_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        self.stats.record_query(query_time_ms);
        Ok(SearchResult {
            items,
            total_candidates,
            query_time_ms,
        })
    }

    /// Inserts many records in one call.
    ///
    /// If the store is currently empty this is a `bulk_build`: the backend
    /// is constructed directly from `records` (the only path that produces
    /// IVF centroids). Otherwise it's a `rebuild_with_merge`: the backend is
    /// rebuilt from the union of existing and new records. Either way, no
    /// record in `records` may share an id with an existing or other new
    /// record — use repeated [`Database::insert`] calls for an
    /// incremental, index-preserving strategy instead.
    pub fn batch_insert(&self, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            self.check_dimension(record.vector.dim())?;
        }

        let mut vectors = self.vectors.write().expect("vector store lock poisoned");
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if vectors.contains_key(&record.id) || !seen.insert(record.id) {
                return Err(Error::InvalidParameter(format!("id {} already exists", record.id)));
            }
        }

        let idx = self.pin_index();
        if vectors.is_empty() {
            idx.build(&records)?;
        } else {
            let mut merged: Vec<VectorRecord> = vectors.values().cloned().collect();
            merged.extend(records.iter().cloned());
            idx.build(&merged)?;
        }

        for record in records {
            vectors.insert(record.id, record);
            self.stats.record_insert();
        }
        Ok(())
    }

    /// Number of vectors currently stored.
    pub fn size(&self) -> usize {
        self.vectors.read().expect("vector store lock poisoned").len()
    }

    /// Configured dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// This database's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A point-in-time snapshot of usage counters.
    pub fn stats(&self) -> DatabaseStats {
        let idx = self.pin_index();
        let vectors = self.vectors.read().expect("vector store lock poisoned");
        let vector_bytes = vectors.len() * self.config.dimension * std::mem::size_of::<f32>();
        let index_bytes = idx.memory_usage();
        self.stats.snapshot(vectors.len(), self.config.dimension, index_bytes, index_bytes + vector_bytes)
    }

    /// Persists vectors, config, and the active index to `config.data_path`.
    ///
    /// Reserved for write-ahead logging, which is out of scope: returns
    /// [`Error::NotImplemented`] if `config.enable_wal` is set.
    pub fn flush(&self) -> Result<()> {
        if self.config.enable_wal {
            return Err(Error::NotImplemented("write-ahead logging".into()));
        }
        self.save(&self.config.data_path.clone())
    }

    /// Persists vectors, config, and the active index to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "saving database snapshot");

        let vectors = self.vectors.read().expect("vector store lock poisoned");
        crate::persistence::write_vectors(path, &vectors, self.config.dimension)?;
        drop(vectors);

        let idx = self.pin_index();
        crate::persistence::write_index(path, |w| idx.serialize(w))?;

        let config_json = serde_json::to_vec_pretty(&self.config).map_err(|e| Error::InvalidState(e.to_string()))?;
        fs::write(path.join("config.json"), config_json)?;

        Ok(())
    }

    /// Loads a database previously written by [`Database::save`].
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading database snapshot");

        let config_bytes = fs::read(path.join("config.json"))?;
        let config: Config = serde_json::from_slice(&config_bytes).map_err(|e| Error::InvalidState(e.to_string()))?;

        let vectors = crate::persistence::read_vectors(path, config.dimension)?;

        let backend = Self::build_backend(&config);
        crate::persistence::read_index(path, |r| backend.deserialize(r))?;

        Ok(Self {
            config,
            vectors: RwLock::new(vectors),
            index: RwLock::new(Arc::from(backend)),
            write_log: WriteLog::new(),
            stats: Stats::new(),
        })
    }

    /// Runs the backend's cheap structural repair pass in place (HNSW's
    /// `compact`, or IVF's no-op).
    pub fn compact(&self) -> Result<()> {
        self.pin_index().compact()
    }

    /// Non-blocking index maintenance: clone the current data into a fresh
    /// backend, optimize the clone, replay writes that landed during the
    /// clone/optimize window, then swap it in.
    ///
    /// Concurrent readers and writers are never blocked: writers keep
    /// hitting the live index directly (and get tee'd into the write log);
    /// readers keep pinning whichever `Arc` was current when they started.
    /// Aborts with [`Error::Busy`] if the write log grows past its warn
    /// threshold before replay, rather than replay an unbounded backlog.
    pub fn optimize_index(&self) -> Result<()> {
        tracing::info!("starting index maintenance");
        let old = self.pin_index();
        let records = self.all_records();

        self.write_log.enable();

        let clone = old.clone_empty();
        if let Err(e) = clone.build(&records) {
            self.write_log.disable();
            return Err(e);
        }
        if let Err(e) = clone.optimize() {
            self.write_log.disable();
            return Err(e);
        }

        if self.write_log.size() > crate::write_log::DEFAULT_WARN_THRESHOLD {
            self.write_log.disable();
            tracing::warn!("aborting index maintenance: write log exceeded warn threshold");
            return Err(Error::Busy);
        }

        let clone: Arc<dyn IndexBackend> = Arc::from(clone);
        if let Err(e) = self.write_log.replay_to(clone.as_ref()) {
            self.write_log.disable();
            return Err(e);
        }

        {
            let mut active = self.index.write().expect("index lock poisoned");
            *active = clone;
        }
        self.write_log.disable();
        tracing::info!("index maintenance complete");
        Ok(())
    }
}
