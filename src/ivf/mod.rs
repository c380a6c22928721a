//! Inverted-file (IVF) cluster index.

mod index;
mod persistence;

pub use index::IvfIndex;
