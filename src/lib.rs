//! # lynxdb
//!
//! An embeddable approximate-nearest-neighbor vector database.
//!
//! `lynxdb` stores vectors under caller-assigned ids and answers k-nearest-
//! neighbor queries under a configurable distance metric, backed by either
//! an HNSW graph, an IVF cluster index, or a brute-force flat scan.
//!
//! ```rust,no_run
//! use lynxdb::{Config, Database, DistanceMetric, SearchParams, Vector};
//!
//! # fn example() -> lynxdb::Result<()> {
//! let db = Database::create(Config::new(384, DistanceMetric::Cosine))?;
//!
//! db.insert(1, Vector::new(vec![0.1; 384]))?;
//!
//! let result = db.search(&[0.1; 384], 10, &SearchParams::none())?;
//! for hit in &result.items {
//!     println!("{} at distance {}", hit.id, hit.distance);
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod config;
mod database;
mod distance;
mod error;
mod flat;
mod hnsw;
mod ivf;
mod kmeans;
mod persistence;
mod search;
mod stats;
mod vector;
mod visited;
mod write_log;

pub use backend::IndexBackend;
pub use config::{Config, HnswParams, IndexKind, IvfParams};
pub use database::Database;
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use search::{DatabaseStats, IdFilter, ScoredId, SearchParams, SearchResult};
pub use vector::{Vector, VectorId, VectorRecord};
