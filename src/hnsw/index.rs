//! The HNSW [`crate::backend::IndexBackend`] implementation.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::{Mutex, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::IndexBackend;
use crate::config::HnswParams;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::hnsw::graph::{self, HnswState};
use crate::hnsw::node::HnswNode;
use crate::hnsw::persistence;
use crate::search::{ScoredId, SearchParams};
use crate::vector::{VectorId, VectorRecord};

/// A node is never assigned above this layer; bounds the pathological tail
/// of the exponential layer distribution.
const MAX_LAYER: usize = 16;

/// Hierarchical Navigable Small World index.
pub struct HnswIndex {
    dim: usize,
    metric: DistanceMetric,
    params: HnswParams,
    state: RwLock<HnswState>,
    rng: Mutex<StdRng>,
}

impl HnswIndex {
    pub fn new(dim: usize, metric: DistanceMetric, params: HnswParams) -> Self {
        Self {
            dim,
            metric,
            params,
            state: RwLock::new(HnswState::new(dim)),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic constructor, used by tests and anywhere reproducible
    /// graph construction matters.
    pub fn with_seed(dim: usize, metric: DistanceMetric, params: HnswParams, seed: u64) -> Self {
        Self {
            dim,
            metric,
            params,
            state: RwLock::new(HnswState::new(dim)),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn sample_layer(&self) -> usize {
        let m_l = self.params.level_multiplier();
        let mut rng = self.rng.lock().expect("hnsw rng poisoned");
        let r: f64 = rng.random_range(f64::EPSILON..1.0);
        let layer = (-r.ln() * m_l).floor().max(0.0) as usize;
        layer.min(MAX_LAYER)
    }

    fn insert_into_graph(state: &mut HnswState, metric: DistanceMetric, params: &HnswParams, id: VectorId, vector: &[f32], layer: usize) {
        state.buffer.push(id, vector);
        state.nodes.insert(id, HnswNode::new(layer));

        let Some(prev_entry) = state.entry_point else {
            state.entry_point = Some(id);
            state.entry_layer = layer;
            return;
        };
        let prev_entry_layer = state.entry_layer;

        let mut cur = prev_entry;
        if layer < prev_entry_layer {
            cur = graph::greedy_descent(state, metric, vector, cur, prev_entry_layer, layer);
        }
        let mut entry_points: Vec<VectorId> = vec![cur];

        let mut visited = crate::visited::VisitedTable::new(state.buffer.len());
        for l in (0..=layer.min(prev_entry_layer)).rev() {
            let candidates = graph::search_layer(state, metric, vector, &entry_points, params.ef_construction.max(1), l, &mut visited);
            let cap = if l == 0 { params.m0() } else { params.m };
            let selected = graph::select_heuristic(state, metric, vector, &candidates, cap);

            for &nb in &selected {
                state.nodes.get_mut(&id).expect("just inserted").neighbors_at_mut(l).expect("layer within range").insert(nb);
                if let Some(nb_node) = state.nodes.get_mut(&nb) {
                    if let Some(nb_neighbors) = nb_node.neighbors_at_mut(l) {
                        nb_neighbors.insert(id);
                    }
                }

                let nb_len = state.nodes.get(&nb).and_then(|n| n.neighbors_at(l)).map(|s| s.len()).unwrap_or(0);
                if nb_len > cap {
                    let nb_vector = state.buffer.get(nb).expect("neighbor has a stored vector").to_vec();
                    let nb_candidates: Vec<(f32, VectorId)> = state
                        .nodes
                        .get(&nb)
                        .and_then(|n| n.neighbors_at(l))
                        .into_iter()
                        .flatten()
                        .map(|&c| (metric.calculate(&nb_vector, state.buffer.get(c).expect("neighbor candidate has a stored vector")), c))
                        .collect();
                    let pruned: HashSet<VectorId> = graph::select_heuristic(state, metric, &nb_vector, &nb_candidates, cap).into_iter().collect();
                    if let Some(nb_node) = state.nodes.get_mut(&nb) {
                        if let Some(nb_neighbors) = nb_node.neighbors_at_mut(l) {
                            *nb_neighbors = pruned;
                        }
                    }
                }
            }

            entry_points = candidates.iter().map(|&(_, cand_id)| cand_id).collect();
        }

        if layer > prev_entry_layer {
            state.entry_point = Some(id);
            state.entry_layer = layer;
        }
    }

    fn reselect_entry_point(state: &mut HnswState) {
        let best = state.nodes.iter().max_by_key(|(_, n)| n.max_layer).map(|(&id, n)| (id, n.max_layer));
        match best {
            Some((id, layer)) => {
                state.entry_point = Some(id);
                state.entry_layer = layer;
            }
            None => {
                state.entry_point = None;
                state.entry_layer = 0;
            }
        }
    }
}

impl IndexBackend for HnswIndex {
    fn add(&self, id: VectorId, vector: &[f32]) -> Result<()> {
        let mut state = self.state.write().expect("hnsw state poisoned");
        if state.buffer.contains(id) {
            return Err(Error::InvalidState(format!("id {id} already exists")));
        }
        let layer = self.sample_layer();
        Self::insert_into_graph(&mut state, self.metric, &self.params, id, vector, layer);
        Ok(())
    }

    fn remove(&self, id: VectorId) -> Result<()> {
        let mut state = self.state.write().expect("hnsw state poisoned");
        let Some(node) = state.nodes.remove(&id) else {
            return Err(Error::VectorNotFound(id));
        };

        for (layer, neighbors) in node.neighbors.iter().enumerate() {
            for &nb in neighbors {
                if let Some(nb_node) = state.nodes.get_mut(&nb) {
                    if let Some(nb_neighbors) = nb_node.neighbors_at_mut(layer) {
                        nb_neighbors.remove(&id);
                    }
                }
            }
        }

        state.buffer.remove(id);

        if state.entry_point == Some(id) {
            Self::reselect_entry_point(&mut state);
        }

        Ok(())
    }

    fn contains(&self, id: VectorId) -> bool {
        let state = self.state.read().expect("hnsw state poisoned");
        state.nodes.contains_key(&id)
    }

    fn search(&self, query: &[f32], k: usize, params: &SearchParams) -> Result<(Vec<ScoredId>, usize)> {
        let state = self.state.read().expect("hnsw state poisoned");
        let Some(entry) = state.entry_point else {
            return Ok((Vec::new(), 0));
        };

        let ef = params.ef_search.unwrap_or(self.params.ef_search).max(k).max(1);
        let cur = graph::greedy_descent(&state, self.metric, query, entry, state.entry_layer, 0);

        let mut visited = crate::visited::VisitedTable::new(state.buffer.len());
        let candidates = graph::search_layer(&state, self.metric, query, &[cur], ef, 0, &mut visited);

        let total_candidates = state.buffer.len();
        let items = candidates
            .into_iter()
            .filter(|(_, id)| params.accepts(*id))
            .take(k)
            .map(|(distance, id)| ScoredId { id, distance })
            .collect();

        Ok((items, total_candidates))
    }

    fn build(&self, records: &[VectorRecord]) -> Result<()> {
        let mut state = self.state.write().expect("hnsw state poisoned");
        *state = HnswState::new(self.dim);
        drop(state);

        for record in records {
            let layer = self.sample_layer();
            let mut state = self.state.write().expect("hnsw state poisoned");
            Self::insert_into_graph(&mut state, self.metric, &self.params, record.id, record.vector.as_slice(), layer);
        }
        Ok(())
    }

    fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        let state = self.state.read().expect("hnsw state poisoned");
        persistence::write(&state, self.metric, &self.params, writer)
    }

    fn deserialize(&self, reader: &mut dyn Read) -> Result<()> {
        let loaded = persistence::read(self.dim, self.metric, reader)?;
        let mut state = self.state.write().expect("hnsw state poisoned");
        *state = loaded;
        Ok(())
    }

    fn size(&self) -> usize {
        let state = self.state.read().expect("hnsw state poisoned");
        state.nodes.len()
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn memory_usage(&self) -> usize {
        let state = self.state.read().expect("hnsw state poisoned");
        let buffer_bytes = state.buffer.memory_bytes();
        let graph_bytes: usize = state
            .nodes
            .values()
            .map(|n| n.neighbors.iter().map(|s| s.capacity() * std::mem::size_of::<VectorId>()).sum::<usize>())
            .sum();
        buffer_bytes + graph_bytes
    }

    fn optimize(&self) -> Result<()> {
        let mut state = self.state.write().expect("hnsw state poisoned");
        let ids: Vec<VectorId> = state.nodes.keys().copied().collect();

        for id in ids {
            let Some(vector) = state.buffer.get(id).map(|v| v.to_vec()) else {
                continue;
            };
            let max_layer = state.nodes.get(&id).map(|n| n.max_layer).unwrap_or(0);

            for layer in 0..=max_layer {
                let cap = if layer == 0 { self.params.m0() } else { self.params.m };
                let neighbors: Vec<VectorId> = state.nodes.get(&id).and_then(|n| n.neighbors_at(layer)).into_iter().flatten().copied().collect();
                if neighbors.len() <= cap {
                    continue;
                }
                let candidates: Vec<(f32, VectorId)> = neighbors
                    .iter()
                    .filter_map(|&c| state.buffer.get(c).map(|v| (self.metric.calculate(&vector, v), c)))
                    .collect();
                let kept: HashSet<VectorId> = graph::select_heuristic(&state, self.metric, &vector, &candidates, cap).into_iter().collect();
                let dropped: Vec<VectorId> = neighbors.iter().filter(|c| !kept.contains(c)).copied().collect();

                if let Some(node) = state.nodes.get_mut(&id) {
                    if let Some(set) = node.neighbors_at_mut(layer) {
                        *set = kept;
                    }
                }
                for nb in dropped {
                    if let Some(nb_node) = state.nodes.get_mut(&nb) {
                        if let Some(nb_neighbors) = nb_node.neighbors_at_mut(layer) {
                            nb_neighbors.remove(&id);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn compact(&self) -> Result<()> {
        let mut state = self.state.write().expect("hnsw state poisoned");
        let known: HashSet<VectorId> = state.nodes.keys().copied().collect();

        for node in state.nodes.values_mut() {
            for layer in node.neighbors.iter_mut() {
                layer.retain(|id| known.contains(id));
            }
        }

        let entry_valid = state.entry_point.is_some_and(|e| state.nodes.contains_key(&e));
        if !entry_valid {
            Self::reselect_entry_point(&mut state);
        }

        Ok(())
    }

    fn clone_empty(&self) -> Box<dyn IndexBackend> {
        Box::new(HnswIndex::new(self.dim, self.metric, self.params))
    }
}
