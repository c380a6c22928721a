//! Database and index configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::distance::DistanceMetric;

/// Which index backend a [`Config`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Brute-force linear scan. Trivial, exact, O(n) per query.
    Flat,
    /// Hierarchical Navigable Small World graph.
    Hnsw,
    /// Inverted-file cluster index.
    Ivf,
}

/// HNSW-specific tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Target bidirectional fan-out per node per layer above layer 0.
    pub m: usize,
    /// Candidate list size used while building the graph.
    pub ef_construction: usize,
    /// Default candidate list size used while searching, overridable per
    /// query via [`crate::search::SearchParams`].
    pub ef_search: usize,
    /// Soft capacity hint for the backing vector buffer.
    pub max_elements: usize,
}

impl HnswParams {
    /// A fast preset: lower recall, cheaper inserts and searches.
    pub fn fast() -> Self {
        Self {
            m: 8,
            ef_construction: 100,
            ef_search: 50,
            max_elements: 100_000,
        }
    }

    /// The default, balanced preset.
    pub fn balanced() -> Self {
        Self::default()
    }

    /// A high-recall preset: more memory, slower builds and searches.
    pub fn high_quality() -> Self {
        Self {
            m: 32,
            ef_construction: 400,
            ef_search: 200,
            max_elements: 100_000,
        }
    }

    /// `M_0`, the neighbor cap at layer 0: `M_0 = 2·M`.
    pub fn m0(&self) -> usize {
        self.m * 2
    }

    /// `m_L = 1 / ln(M)`, the layer-assignment normalization factor.
    pub fn level_multiplier(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            max_elements: 100_000,
        }
    }
}

/// IVF-specific tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IvfParams {
    /// Number of clusters (`k`) trained by `build`.
    pub n_clusters: usize,
    /// Default number of clusters probed per query.
    pub n_probe: usize,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            n_clusters: 256,
            n_probe: 8,
        }
    }
}

/// Immutable database configuration, fixed at `create` time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fixed vector dimension, `D`.
    pub dimension: usize,
    /// Distance metric used by every index operation.
    pub distance_metric: DistanceMetric,
    /// Which index backend to construct.
    pub index_type: IndexKind,
    /// HNSW parameters (used when `index_type == IndexKind::Hnsw`).
    pub hnsw: HnswParams,
    /// IVF parameters (used when `index_type == IndexKind::Ivf`).
    pub ivf: IvfParams,
    /// Directory `save`/`load` read and write snapshot files from.
    pub data_path: PathBuf,
    /// Hint for sizing an external read-dispatch pool. Not enforced here;
    /// request dispatch is out of scope for this crate.
    pub num_query_threads: usize,
    /// Hint for sizing internal parallel maintenance work (e.g. the k-means
    /// assignment step driving IVF `build`).
    pub num_index_threads: usize,
    /// Reserved. Write-ahead logging is out of scope; setting this causes
    /// `flush()` to return [`crate::Error::NotImplemented`].
    pub enable_wal: bool,
}

impl Config {
    /// Creates a configuration with HNSW defaults for the given dimension
    /// and metric.
    pub fn new(dimension: usize, distance_metric: DistanceMetric) -> Self {
        Self {
            dimension,
            distance_metric,
            index_type: IndexKind::Hnsw,
            hnsw: HnswParams::default(),
            ivf: IvfParams::default(),
            data_path: PathBuf::from("./lynxdb_data"),
            num_query_threads: num_cpus_hint(),
            num_index_threads: num_cpus_hint(),
            enable_wal: false,
        }
    }

    /// Builder-style: select the index backend.
    pub fn with_index_type(mut self, index_type: IndexKind) -> Self {
        self.index_type = index_type;
        self
    }

    /// Builder-style: override HNSW parameters.
    pub fn with_hnsw(mut self, hnsw: HnswParams) -> Self {
        self.hnsw = hnsw;
        self
    }

    /// Builder-style: override IVF parameters.
    pub fn with_ivf(mut self, ivf: IvfParams) -> Self {
        self.ivf = ivf;
        self
    }

    /// Builder-style: set the snapshot directory.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }
}

/// A coarse, dependency-free stand-in for `std::thread::available_parallelism`
/// failures: falls back to 4 if the platform can't report a thread count.
fn num_cpus_hint() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
