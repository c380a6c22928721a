//! Graph primitives: beam search, heuristic neighbor selection, and greedy
//! descent.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::distance::DistanceMetric;
use crate::hnsw::buffer::VectorBuffer;
use crate::hnsw::node::HnswNode;
use crate::visited::VisitedTable;
use crate::vector::VectorId;

/// `f32` wrapper giving candidates a total order for the binary heaps.
/// Distances here are always finite (sums/sqrts of finite floats), so
/// `partial_cmp` never actually falls through to the `Equal` fallback in
/// practice; the fallback just keeps this total rather than partial.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedDist(f32);

impl Eq for OrderedDist {}

impl PartialOrd for OrderedDist {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedDist {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// The mutable graph state a single [`crate::hnsw::index::HnswIndex`] owns
/// behind one readers-writer lock.
pub struct HnswState {
    pub nodes: HashMap<VectorId, HnswNode>,
    pub buffer: VectorBuffer,
    pub entry_point: Option<VectorId>,
    pub entry_layer: usize,
}

impl HnswState {
    pub fn new(dim: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            buffer: VectorBuffer::new(dim),
            entry_point: None,
            entry_layer: 0,
        }
    }

    #[inline]
    pub fn distance_to(&self, metric: DistanceMetric, query: &[f32], id: VectorId) -> f32 {
        let row = self.buffer.get(id).expect("id present in graph must have a stored vector");
        metric.calculate(query, row)
    }

    pub fn global_max_layer(&self) -> usize {
        self.nodes.values().map(|n| n.max_layer).max().unwrap_or(0)
    }
}

/// Classic HNSW beam search at a single layer.
///
/// Returns up to `ef` results, ascending by distance. `visited` is reused
/// across calls within one logical search (the caller resets it between
/// independent queries).
pub fn search_layer(
    state: &HnswState,
    metric: DistanceMetric,
    query: &[f32],
    entry_points: &[VectorId],
    ef: usize,
    layer: usize,
    visited: &mut VisitedTable,
) -> Vec<(f32, VectorId)> {
    visited.resize(state.buffer.len().max(1));
    visited.reset();

    let mut candidates: BinaryHeap<Reverse<(OrderedDist, VectorId)>> = BinaryHeap::new();
    let mut result: BinaryHeap<(OrderedDist, VectorId)> = BinaryHeap::new();

    for &ep in entry_points {
        let row = match state.buffer.row_of(ep) {
            Some(r) => r,
            None => continue,
        };
        if visited.is_visited(row) {
            continue;
        }
        visited.mark(row);
        let dist = state.distance_to(metric, query, ep);
        candidates.push(Reverse((OrderedDist(dist), ep)));
        result.push((OrderedDist(dist), ep));
    }

    while let Some(Reverse((OrderedDist(cur_dist), cur_id))) = candidates.pop() {
        if let Some(&(OrderedDist(farthest), _)) = result.peek() {
            if result.len() >= ef && cur_dist > farthest {
                break;
            }
        }

        let Some(node) = state.nodes.get(&cur_id) else {
            continue;
        };
        let Some(neighbors) = node.neighbors_at(layer) else {
            continue;
        };

        for &n in neighbors {
            let Some(row) = state.buffer.row_of(n) else {
                continue;
            };
            if visited.is_visited(row) {
                continue;
            }
            visited.mark(row);

            let dist = state.distance_to(metric, query, n);
            let farthest_in_result = result.peek().map(|(OrderedDist(d), _)| *d);

            if result.len() < ef || farthest_in_result.is_none_or(|f| dist < f) {
                candidates.push(Reverse((OrderedDist(dist), n)));
                result.push((OrderedDist(dist), n));
                if result.len() > ef {
                    result.pop();
                }
            }
        }
    }

    let mut out: Vec<(f32, VectorId)> = result.into_iter().map(|(OrderedDist(d), id)| (d, id)).collect();
    out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Diversifying heuristic neighbor selection.
///
/// Greedily accepts the nearest remaining candidate iff it isn't closer to
/// an already-accepted neighbor than it is to the query — this is what
/// keeps neighbor sets sparse and well spread, which recall depends on.
/// Rejected candidates are kept aside and used to pad the result up to `m`
/// if too few survive the heuristic.
pub fn select_heuristic(
    state: &HnswState,
    metric: DistanceMetric,
    query: &[f32],
    candidates: &[(f32, VectorId)],
    m: usize,
) -> Vec<VectorId> {
    let mut ordered = candidates.to_vec();
    ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut accepted: Vec<VectorId> = Vec::with_capacity(m);
    let mut rejected: Vec<VectorId> = Vec::new();

    for &(dist_to_query, cand) in &ordered {
        if accepted.len() >= m {
            break;
        }
        let Some(cand_vec) = state.buffer.get(cand) else {
            continue;
        };

        let dominated = accepted.iter().any(|&s| {
            let Some(s_vec) = state.buffer.get(s) else {
                return false;
            };
            metric.calculate(cand_vec, s_vec) < dist_to_query
        });

        if dominated {
            rejected.push(cand);
        } else {
            accepted.push(cand);
        }
    }

    if accepted.len() < m {
        for cand in rejected {
            if accepted.len() >= m {
                break;
            }
            if !accepted.contains(&cand) {
                accepted.push(cand);
            }
        }
    }

    accepted
}

/// Greedy single-nearest descent through layers `from` down to `to + 1`.
///
/// At each layer, repeatedly steps to whichever neighbor of the current
/// node is strictly closer to `query`, stopping when no neighbor improves.
pub fn greedy_descent(
    state: &HnswState,
    metric: DistanceMetric,
    query: &[f32],
    start: VectorId,
    from: usize,
    to: usize,
) -> VectorId {
    let mut current = start;
    if from <= to {
        return current;
    }

    for layer in (to + 1..=from).rev() {
        loop {
            let Some(node) = state.nodes.get(&current) else {
                break;
            };
            let Some(neighbors) = node.neighbors_at(layer) else {
                break;
            };

            let current_dist = state.distance_to(metric, query, current);
            let mut best = current;
            let mut best_dist = current_dist;

            for &n in neighbors {
                let d = state.distance_to(metric, query, n);
                if d < best_dist {
                    best = n;
                    best_dist = d;
                }
            }

            if best == current {
                break;
            }
            current = best;
        }
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;

    fn linear_state(points: &[(VectorId, [f32; 2])]) -> HnswState {
        let mut state = HnswState::new(2);
        for &(id, v) in points {
            state.buffer.push(id, &v);
            state.nodes.insert(id, HnswNode::new(0));
        }
        state
    }

    fn connect(state: &mut HnswState, a: VectorId, b: VectorId, layer: usize) {
        state.nodes.get_mut(&a).unwrap().neighbors_at_mut(layer).unwrap().insert(b);
        state.nodes.get_mut(&b).unwrap().neighbors_at_mut(layer).unwrap().insert(a);
    }

    #[test]
    fn search_layer_finds_seeded_entry_point() {
        let state = linear_state(&[(1, [0.0, 0.0])]);
        let mut visited = VisitedTable::new(1);
        let results = search_layer(&state, DistanceMetric::L2, &[0.0, 0.0], &[1], 5, 0, &mut visited);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, 1);
    }

    #[test]
    fn search_layer_expands_through_edges() {
        let mut state = linear_state(&[(1, [0.0, 0.0]), (2, [1.0, 0.0]), (3, [2.0, 0.0])]);
        connect(&mut state, 1, 2, 0);
        connect(&mut state, 2, 3, 0);

        let mut visited = VisitedTable::new(3);
        let results = search_layer(&state, DistanceMetric::L2, &[2.0, 0.0], &[1], 3, 0, &mut visited);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].1, 3);
    }

    #[test]
    fn select_heuristic_caps_at_m() {
        let state = linear_state(&[(1, [0.0, 0.0]), (2, [1.0, 0.0]), (3, [0.9, 0.0])]);
        let cands = vec![(0.0, 1u64), (1.0, 2u64), (0.9, 3u64)];
        let selected = select_heuristic(&state, DistanceMetric::L2, &[0.0, 0.0], &cands, 2);
        assert!(selected.len() <= 2);
    }

    #[test]
    fn greedy_descent_noop_when_from_not_above_to() {
        let state = linear_state(&[(1, [0.0, 0.0])]);
        let result = greedy_descent(&state, DistanceMetric::L2, &[0.0, 0.0], 1, 0, 0);
        assert_eq!(result, 1);
    }

    #[test]
    fn greedy_descent_moves_toward_query() {
        let mut state = linear_state(&[(1, [0.0, 0.0]), (2, [5.0, 0.0])]);
        state.nodes.insert(1, HnswNode::new(1));
        state.nodes.insert(2, HnswNode::new(1));
        connect(&mut state, 1, 2, 1);

        let result = greedy_descent(&state, DistanceMetric::L2, &[5.0, 0.0], 1, 1, 0);
        assert_eq!(result, 2);
    }
}
