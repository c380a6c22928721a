//! The capability interface shared by every index kind.
//!
//! A small object-safe trait plus `Box<dyn IndexBackend>` lets the façade
//! hold one active backend behind a single lock without a generic
//! parameter leaking into `Database`.
//!
//! Every method other than [`IndexBackend::clone_empty`] takes `&self`: each
//! backend owns its mutability internally (an `RwLock`-guarded state), which
//! is what lets the façade's index lock guard only the *reference* to the
//! active backend rather than the backend's own data.

use std::io::{Read, Write};

use crate::error::Result;
use crate::search::{ScoredId, SearchParams};
use crate::vector::{VectorId, VectorRecord};

/// Uniform operations the database façade drives, independent of whether
/// the active index is HNSW, IVF, or flat.
pub trait IndexBackend: Send + Sync {
    /// Inserts a new vector. Returns `Err` if `id` already exists or the
    /// backend requires state that hasn't been built yet (IVF before
    /// `build`).
    fn add(&self, id: VectorId, vector: &[f32]) -> Result<()>;

    /// Removes `id`. Returns `Err(VectorNotFound)` if absent.
    fn remove(&self, id: VectorId) -> Result<()>;

    /// Whether `id` is currently present.
    fn contains(&self, id: VectorId) -> bool;

    /// Finds up to `k` nearest neighbors of `query`.
    ///
    /// Returns the hits (ascending by distance) and the number of vectors
    /// that were in scope of the search (for `SearchResult::total_candidates`).
    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> Result<(Vec<ScoredId>, usize)>;

    /// Rebuilds the backend from scratch over `records`, discarding any
    /// prior state. Used for bulk construction (empty-store inserts) and
    /// IVF retraining.
    fn build(&self, records: &[VectorRecord]) -> Result<()>;

    /// Writes this backend's on-disk representation.
    fn serialize(&self, writer: &mut dyn Write) -> Result<()>;

    /// Replaces this backend's state by reading a representation written by
    /// [`serialize`](Self::serialize). The backend must already be
    /// configured with matching dimension/parameters (see
    /// [`clone_empty`](Self::clone_empty)); on any format or dimension
    /// mismatch the backend's prior state is left untouched.
    fn deserialize(&self, reader: &mut dyn Read) -> Result<()>;

    /// Current vector count.
    fn size(&self) -> usize;

    /// Configured dimension.
    fn dimension(&self) -> usize;

    /// Rough resident memory estimate, in bytes.
    fn memory_usage(&self) -> usize;

    /// Runs the backend's maintenance pass (HNSW: re-prune neighbor sets;
    /// IVF: retrain centroids from the currently stored vectors).
    fn optimize(&self) -> Result<()>;

    /// Runs a cheaper structural repair pass (HNSW: drop dangling
    /// neighbors, cap layer counts, reselect the entry point; IVF: no-op,
    /// its invariants can't drift without a direct bug).
    fn compact(&self) -> Result<()>;

    /// Constructs a fresh, empty backend of the same kind and parameters as
    /// `self`. Used by `Database::optimize_index` to produce the private
    /// clone it optimizes off to the side.
    fn clone_empty(&self) -> Box<dyn IndexBackend>;
}
