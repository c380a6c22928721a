//! Brute-force linear-scan index.
//!
//! Exact, O(n) per query, no tuning parameters. Useful as a baseline and for
//! dimensions/datasets too small to justify HNSW or IVF's construction cost.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::RwLock;

use crate::backend::IndexBackend;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::search::{ScoredId, SearchParams};
use crate::vector::{VectorId, VectorRecord};

struct FlatState {
    vectors: HashMap<VectorId, Vec<f32>>,
}

pub struct FlatIndex {
    dim: usize,
    metric: DistanceMetric,
    state: RwLock<FlatState>,
}

impl FlatIndex {
    pub fn new(dim: usize, metric: DistanceMetric) -> Self {
        Self {
            dim,
            metric,
            state: RwLock::new(FlatState { vectors: HashMap::new() }),
        }
    }
}

impl IndexBackend for FlatIndex {
    fn add(&self, id: VectorId, vector: &[f32]) -> Result<()> {
        let mut state = self.state.write().expect("flat state poisoned");
        if state.vectors.contains_key(&id) {
            return Err(Error::InvalidState(format!("id {id} already exists")));
        }
        state.vectors.insert(id, vector.to_vec());
        Ok(())
    }

    fn remove(&self, id: VectorId) -> Result<()> {
        let mut state = self.state.write().expect("flat state poisoned");
        state.vectors.remove(&id).map(|_| ()).ok_or(Error::VectorNotFound(id))
    }

    fn contains(&self, id: VectorId) -> bool {
        let state = self.state.read().expect("flat state poisoned");
        state.vectors.contains_key(&id)
    }

    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> Result<(Vec<ScoredId>, usize)> {
        let state = self.state.read().expect("flat state poisoned");
        let mut scored: Vec<ScoredId> = state
            .vectors
            .iter()
            .filter(|(&id, _)| params.accepts(id))
            .map(|(&id, v)| ScoredId {
                id,
                distance: self.metric.calculate(query, v),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        let total = state.vectors.len();
        scored.truncate(k);
        Ok((scored, total))
    }

    fn build(&self, records: &[VectorRecord]) -> Result<()> {
        let mut state = self.state.write().expect("flat state poisoned");
        state.vectors = records.iter().map(|r| (r.id, r.vector.as_slice().to_vec())).collect();
        Ok(())
    }

    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        let state = self.state.read().expect("flat state poisoned");
        writer.write_all(b"FLAT")?;
        writer.write_all(&(state.vectors.len() as u64).to_le_bytes())?;
        for (&id, v) in &state.vectors {
            writer.write_all(&id.to_le_bytes())?;
            for &c in v {
                writer.write_all(&c.to_le_bytes())?;
            }
        }
        Ok(())
    }

    fn deserialize(&self, reader: &mut dyn Read) -> Result<()> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != b"FLAT" {
            return Err(Error::InvalidState("flat snapshot: bad magic".into()));
        }
        let mut count_buf = [0u8; 8];
        reader.read_exact(&mut count_buf)?;
        let count = u64::from_le_bytes(count_buf);

        let mut vectors = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let mut id_buf = [0u8; 8];
            reader.read_exact(&mut id_buf)?;
            let id = u64::from_le_bytes(id_buf);

            let mut v = Vec::with_capacity(self.dim);
            for _ in 0..self.dim {
                let mut f_buf = [0u8; 4];
                reader.read_exact(&mut f_buf)?;
                v.push(f32::from_le_bytes(f_buf));
            }
            vectors.insert(id, v);
        }

        let mut state = self.state.write().expect("flat state poisoned");
        state.vectors = vectors;
        Ok(())
    }

    fn size(&self) -> usize {
        let state = self.state.read().expect("flat state poisoned");
        state.vectors.len()
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn memory_usage(&self) -> usize {
        let state = self.state.read().expect("flat state poisoned");
        state.vectors.values().map(|v| v.capacity() * std::mem::size_of::<f32>()).sum()
    }

    fn optimize(&self) -> Result<()> {
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        Ok(())
    }

    fn clone_empty(&self) -> Box<dyn IndexBackend> {
        Box::new(FlatIndex::new(self.dim, self.metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_search_orders_by_distance() {
        let idx = FlatIndex::new(1, DistanceMetric::L2);
        idx.add(1, &[5.0]).unwrap();
        idx.add(2, &[1.0]).unwrap();
        idx.add(3, &[0.0]).unwrap();

        let (hits, total) = idx.search(&[0.0], 2, &SearchParams::none()).unwrap();
        assert_eq!(total, 3);
        assert_eq!(hits[0].id, 3);
        assert_eq!(hits[1].id, 2);
    }

    #[test]
    fn round_trips_through_serialize() {
        let idx = FlatIndex::new(2, DistanceMetric::L2);
        idx.add(1, &[1.0, 2.0]).unwrap();
        let mut buf = Vec::new();
        idx.serialize(&mut buf).unwrap();

        let loaded = FlatIndex::new(2, DistanceMetric::L2);
        loaded.deserialize(&mut &buf[..]).unwrap();
        assert!(loaded.contains(1));
    }

    #[test]
    fn duplicate_add_rejected() {
        let idx = FlatIndex::new(1, DistanceMetric::L2);
        idx.add(1, &[0.0]).unwrap();
        assert!(idx.add(1, &[0.0]).is_err());
    }
}
