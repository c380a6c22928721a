//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::vector::VectorId;

/// Errors produced by any `lynxdb` operation.
///
/// Every fallible public API returns this type (or [`Result`]). No panics
/// cross a public API boundary outside of `debug_assert!`-guarded invariant
/// checks, which are meant to be fatal in debug builds only (see
/// [`Error::InvalidState`]).
#[derive(Debug, Error)]
pub enum Error {
    /// A vector's length did not equal the database's configured dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// `remove`/`get` against an id that is not present.
    #[error("vector not found: {0}")]
    VectorNotFound(VectorId),

    /// An IVF operation was attempted before `build` produced centroids.
    #[error("index has not been built (IVF centroids missing)")]
    IndexNotBuilt,

    /// Bad caller-supplied parameter: duplicate id on strict insert, empty
    /// `build` input, invalid `n_clusters`, and similar.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An internal invariant was violated. Index mutations roll back any
    /// partial state before this is returned.
    #[error("invalid internal state: {0}")]
    InvalidState(String),

    /// Allocation failure, notably cloning the index during maintenance.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// A persistence read or write failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Maintenance was aborted because the write log exceeded its warn
    /// threshold before replay could complete.
    #[error("maintenance busy: write log exceeded warn threshold")]
    Busy,

    /// A reserved capability was requested (currently only `enable_wal`).
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
