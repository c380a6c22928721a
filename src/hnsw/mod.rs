//! Hierarchical Navigable Small World index.

mod buffer;
mod graph;
mod index;
mod node;
mod persistence;

pub use index::HnswIndex;
