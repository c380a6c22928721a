//! Vector and vector-record types.

use serde::{Deserialize, Serialize};

/// Unique identifier for a vector, stable for the lifetime of the record.
pub type VectorId = u64;

/// A dense vector of single-precision floats.
///
/// Wraps a `Vec<f32>` rather than exposing one directly so that future
/// alignment/layout changes (e.g. a SIMD-friendly backing store) don't leak
/// into the public API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Creates a vector from raw float data.
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Number of components.
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    /// Borrowed view over the raw components.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the vector, returning the raw float data.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[f32]> for Vector {
    fn as_ref(&self) -> &[f32] {
        &self.data
    }
}

/// A stored vector together with its identifier and optional metadata.
///
/// `metadata` is an opaque byte string: the database stores it verbatim and
/// never interprets its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique id, assigned by the caller.
    pub id: VectorId,
    /// The vector payload.
    pub vector: Vector,
    /// Opaque caller-supplied metadata.
    pub metadata: Option<Vec<u8>>,
}

impl VectorRecord {
    /// Creates a record with no metadata.
    pub fn new(id: VectorId, vector: Vector) -> Self {
        Self {
            id,
            vector,
            metadata: None,
        }
    }

    /// Creates a record carrying opaque metadata.
    pub fn with_metadata(id: VectorId, vector: Vector, metadata: Vec<u8>) -> Self {
        Self {
            id,
            vector,
            metadata: Some(metadata),
        }
    }
}
