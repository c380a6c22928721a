//! The IVF [`crate::backend::IndexBackend`] implementation.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Mutex, RwLock};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::backend::IndexBackend;
use crate::config::IvfParams;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::ivf::persistence;
use crate::kmeans;
use crate::search::{ScoredId, SearchParams};
use crate::vector::{VectorId, VectorRecord};

/// One cluster's members: parallel `ids`/flat `vectors` arrays, same
/// swap-remove discipline as the HNSW vector buffer.
pub(crate) struct IvfList {
    pub ids: Vec<VectorId>,
    pub vectors: Vec<f32>,
}

impl IvfList {
    fn new() -> Self {
        Self {
            ids: Vec::new(),
            vectors: Vec::new(),
        }
    }

    fn push(&mut self, dim: usize, id: VectorId, vector: &[f32]) {
        debug_assert_eq!(vector.len(), dim);
        self.ids.push(id);
        self.vectors.extend_from_slice(vector);
    }

    fn row(&self, dim: usize, row: usize) -> &[f32] {
        &self.vectors[row * dim..(row + 1) * dim]
    }

    fn remove(&mut self, dim: usize, id: VectorId) {
        let Some(row) = self.ids.iter().position(|&i| i == id) else {
            return;
        };
        let last = self.ids.len() - 1;
        if row != last {
            self.ids[row] = self.ids[last];
            for d in 0..dim {
                self.vectors[row * dim + d] = self.vectors[last * dim + d];
            }
        }
        self.ids.pop();
        self.vectors.truncate(self.ids.len() * dim);
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

pub(crate) struct IvfState {
    pub centroids: Vec<Vec<f32>>,
    pub lists: Vec<IvfList>,
    pub id_to_list: HashMap<VectorId, usize>,
}

impl IvfState {
    fn new() -> Self {
        Self {
            centroids: Vec::new(),
            lists: Vec::new(),
            id_to_list: HashMap::new(),
        }
    }

    fn is_built(&self) -> bool {
        !self.centroids.is_empty()
    }

    fn nearest_cluster(&self, metric: DistanceMetric, vector: &[f32]) -> usize {
        self.centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, metric.calculate(vector, c)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .expect("nearest_cluster requires a built index")
    }

    fn probed_clusters(&self, metric: DistanceMetric, query: &[f32], n_probe: usize) -> Vec<usize> {
        let mut ranked: Vec<(usize, f32)> = self.centroids.iter().enumerate().map(|(i, c)| (i, metric.calculate(query, c))).collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().take(n_probe).map(|(i, _)| i).collect()
    }
}

/// Inverted-file cluster index.
pub struct IvfIndex {
    dim: usize,
    metric: DistanceMetric,
    params: IvfParams,
    state: RwLock<IvfState>,
    rng: Mutex<StdRng>,
}

impl IvfIndex {
    pub fn new(dim: usize, metric: DistanceMetric, params: IvfParams) -> Self {
        Self {
            dim,
            metric,
            params,
            state: RwLock::new(IvfState::new()),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_seed(dim: usize, metric: DistanceMetric, params: IvfParams, seed: u64) -> Self {
        Self {
            dim,
            metric,
            params,
            state: RwLock::new(IvfState::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn train_and_fill(&self, state: &mut IvfState, records: &[VectorRecord]) {
        *state = IvfState::new();
        if records.is_empty() {
            return;
        }

        let points: Vec<&[f32]> = records.iter().map(|r| r.vector.as_slice()).collect();
        let mut rng = self.rng.lock().expect("ivf rng poisoned");
        let result = kmeans::train(&points, self.params.n_clusters, &mut rng);
        drop(rng);

        state.centroids = result.centroids;
        state.lists = (0..state.centroids.len()).map(|_| IvfList::new()).collect();

        for (record, &cluster) in records.iter().zip(result.assignments.iter()) {
            state.lists[cluster].push(self.dim, record.id, record.vector.as_slice());
            state.id_to_list.insert(record.id, cluster);
        }
    }
}

impl IndexBackend for IvfIndex {
    fn add(&self, id: VectorId, vector: &[f32]) -> Result<()> {
        let mut state = self.state.write().expect("ivf state poisoned");
        if !state.is_built() {
            return Err(Error::IndexNotBuilt);
        }
        if state.id_to_list.contains_key(&id) {
            return Err(Error::InvalidState(format!("id {id} already exists")));
        }

        let cluster = state.nearest_cluster(self.metric, vector);
        state.lists[cluster].push(self.dim, id, vector);
        state.id_to_list.insert(id, cluster);
        Ok(())
    }

    fn remove(&self, id: VectorId) -> Result<()> {
        let mut state = self.state.write().expect("ivf state poisoned");
        let Some(cluster) = state.id_to_list.remove(&id) else {
            return Err(Error::VectorNotFound(id));
        };
        state.lists[cluster].remove(self.dim, id);
        Ok(())
    }

    fn contains(&self, id: VectorId) -> bool {
        let state = self.state.read().expect("ivf state poisoned");
        state.id_to_list.contains_key(&id)
    }

    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> Result<(Vec<ScoredId>, usize)> {
        let state = self.state.read().expect("ivf state poisoned");
        if !state.is_built() {
            return Err(Error::IndexNotBuilt);
        }

        let n_probe = params.n_probe.unwrap_or(self.params.n_probe).max(1).min(state.centroids.len());
        let probed = state.probed_clusters(self.metric, query, n_probe);

        let mut total_candidates = 0usize;
        let mut scored: Vec<ScoredId> = Vec::new();

        for cluster in probed {
            let list = &state.lists[cluster];
            total_candidates += list.len();
            for (row, &id) in list.ids.iter().enumerate() {
                if !params.accepts(id) {
                    continue;
                }
                let distance = self.metric.calculate(query, list.row(self.dim, row));
                scored.push(ScoredId { id, distance });
            }
        }

        scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok((scored, total_candidates))
    }

    fn build(&self, records: &[VectorRecord]) -> Result<()> {
        let mut state = self.state.write().expect("ivf state poisoned");
        self.train_and_fill(&mut state, records);
        Ok(())
    }

    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        let state = self.state.read().expect("ivf state poisoned");
        persistence::write(&state, self.dim, self.metric, writer)
    }

    fn deserialize(&self, reader: &mut dyn Read) -> Result<()> {
        let loaded = persistence::read(self.dim, self.metric, reader)?;
        let mut state = self.state.write().expect("ivf state poisoned");
        *state = loaded;
        Ok(())
    }

    fn size(&self) -> usize {
        let state = self.state.read().expect("ivf state poisoned");
        state.lists.iter().map(IvfList::len).sum()
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn memory_usage(&self) -> usize {
        let state = self.state.read().expect("ivf state poisoned");
        let centroid_bytes: usize = state.centroids.iter().map(|c| c.capacity() * std::mem::size_of::<f32>()).sum();
        let list_bytes: usize = state
            .lists
            .iter()
            .map(|l| l.vectors.capacity() * std::mem::size_of::<f32>() + l.ids.capacity() * std::mem::size_of::<VectorId>())
            .sum();
        centroid_bytes + list_bytes
    }

    fn optimize(&self) -> Result<()> {
        let mut state = self.state.write().expect("ivf state poisoned");
        if !state.is_built() {
            return Ok(());
        }

        let mut records = Vec::with_capacity(state.id_to_list.len());
        for list in &state.lists {
            for (row, &id) in list.ids.iter().enumerate() {
                records.push(VectorRecord::new(id, crate::vector::Vector::new(list.row(self.dim, row).to_vec())));
            }
        }
        self.train_and_fill(&mut state, &records);
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        // IVF's invariants (every id in exactly one list, lists partition
        // the id space) can't drift without a direct bug, so there is
        // nothing to repair.
        Ok(())
    }

    fn clone_empty(&self) -> Box<dyn IndexBackend> {
        Box::new(IvfIndex::new(self.dim, self.metric, self.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;

    fn params() -> IvfParams {
        IvfParams { n_clusters: 2, n_probe: 2 }
    }

    fn seed_records() -> Vec<VectorRecord> {
        let mut records = Vec::new();
        for i in 0..6u64 {
            let x = if i < 3 { 0.0 } else { 10.0 };
            records.push(VectorRecord::new(i, Vector::new(vec![x, i as f32])));
        }
        records
    }

    #[test]
    fn search_before_build_is_index_not_built() {
        let idx = IvfIndex::with_seed(2, DistanceMetric::L2, params(), 1);
        match idx.search(&[0.0, 0.0], 1, &SearchParams::none()) {
            Err(Error::IndexNotBuilt) => {}
            other => panic!("expected IndexNotBuilt, got {other:?}"),
        }
    }

    #[test]
    fn build_then_search_finds_nearby_cluster() {
        let idx = IvfIndex::with_seed(2, DistanceMetric::L2, params(), 3);
        idx.build(&seed_records()).unwrap();

        let (hits, total) = idx.search(&[10.0, 4.0], 1, &SearchParams::none()).unwrap();
        assert!(total > 0);
        assert!(hits[0].id >= 3);
    }

    #[test]
    fn add_after_build_assigns_nearest_cluster() {
        let idx = IvfIndex::with_seed(2, DistanceMetric::L2, params(), 4);
        idx.build(&seed_records()).unwrap();
        idx.add(100, &[10.0, 100.0]).unwrap();
        assert!(idx.contains(100));
        assert_eq!(idx.size(), 7);
    }

    #[test]
    fn add_before_build_is_index_not_built() {
        let idx = IvfIndex::with_seed(2, DistanceMetric::L2, params(), 5);
        match idx.add(1, &[0.0, 0.0]) {
            Err(Error::IndexNotBuilt) => {}
            other => panic!("expected IndexNotBuilt, got {other:?}"),
        }
    }

    #[test]
    fn remove_then_contains_is_false() {
        let idx = IvfIndex::with_seed(2, DistanceMetric::L2, params(), 6);
        idx.build(&seed_records()).unwrap();
        idx.remove(0).unwrap();
        assert!(!idx.contains(0));
        assert_eq!(idx.size(), 5);
    }

    #[test]
    fn n_clusters_clamped_when_fewer_points() {
        let idx = IvfIndex::with_seed(2, DistanceMetric::L2, IvfParams { n_clusters: 50, n_probe: 1 }, 7);
        idx.build(&seed_records()[..2]).unwrap();
        let state = idx.state.read().unwrap();
        assert!(state.centroids.len() <= 2);
    }

    #[test]
    fn list_sizes_sum_to_id_to_list_len_after_build_and_mutation() {
        let idx = IvfIndex::with_seed(2, DistanceMetric::L2, IvfParams { n_clusters: 3, n_probe: 3 }, 8);
        let mut records = seed_records();
        for i in 6..20u64 {
            records.push(VectorRecord::new(i, Vector::new(vec![i as f32, (i % 4) as f32])));
        }
        idx.build(&records).unwrap();
        idx.add(200, &[5.0, 5.0]).unwrap();
        idx.remove(1).unwrap();

        let state = idx.state.read().unwrap();
        let list_total: usize = state.lists.iter().map(IvfList::len).sum();
        assert_eq!(list_total, state.id_to_list.len());
        assert_eq!(list_total, idx.size());

        for (&id, &cluster) in &state.id_to_list {
            assert!(state.lists[cluster].ids.contains(&id), "id {id} missing from its assigned list {cluster}");
        }
    }
}
