//! K-means++ initialization and Lloyd's algorithm, used to train IVF
//! centroids.

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

use crate::distance::l2_squared;

/// Stop iterating once total centroid movement drops below this.
pub const DEFAULT_CONVERGENCE_THRESHOLD: f32 = 1e-4;
/// Hard cap on Lloyd iterations, regardless of convergence.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Trained cluster centroids plus each point's assignment.
pub struct KMeansResult {
    /// `k` centroids, each `dim` floats, row-major.
    pub centroids: Vec<Vec<f32>>,
    /// `assignments[i]` is the cluster index of `points[i]`.
    pub assignments: Vec<usize>,
}

/// Runs k-means++ initialization followed by Lloyd iterations to
/// convergence (or [`DEFAULT_MAX_ITERATIONS`]).
///
/// `k` is clamped to `points.len()` if the caller asked for more clusters
/// than there are points to seed them with.
pub fn train(points: &[&[f32]], k: usize, rng: &mut StdRng) -> KMeansResult {
    assert!(!points.is_empty(), "kmeans requires at least one point");
    let k = k.min(points.len()).max(1);
    let dim = points[0].len();

    let mut centroids = init_plus_plus(points, k, rng);
    let mut assignments = vec![0usize; points.len()];

    for _ in 0..DEFAULT_MAX_ITERATIONS {
        assignments
            .par_iter_mut()
            .zip(points.par_iter())
            .for_each(|(assignment, point)| {
                *assignment = nearest_centroid(point, &centroids);
            });

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (d, &v) in point.iter().enumerate() {
                sums[cluster][d] += v;
            }
        }

        let mut movement = 0.0f32;
        let mut new_centroids = centroids.clone();
        for c in 0..k {
            if counts[c] == 0 {
                // Empty cluster: reseed from the point farthest from its own
                // centroid, keeping every cluster non-degenerate.
                let reseed = farthest_point(points, &centroids, &assignments);
                new_centroids[c] = points[reseed].to_vec();
                continue;
            }
            let mean: Vec<f32> = sums[c].iter().map(|&s| s / counts[c] as f32).collect();
            movement += l2_squared(&mean, &centroids[c]).sqrt();
            new_centroids[c] = mean;
        }
        centroids = new_centroids;

        if movement < DEFAULT_CONVERGENCE_THRESHOLD {
            break;
        }
    }

    assignments
        .par_iter_mut()
        .zip(points.par_iter())
        .for_each(|(assignment, point)| {
            *assignment = nearest_centroid(point, &centroids);
        });

    KMeansResult { centroids, assignments }
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, l2_squared(point, c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .expect("centroids is never empty")
}

fn farthest_point(points: &[&[f32]], centroids: &[Vec<f32>], assignments: &[usize]) -> usize {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, l2_squared(p, &centroids[assignments[i]])))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// k-means++ seeding: the first centroid is uniform-random, each subsequent
/// one is sampled with probability proportional to squared distance from
/// the nearest already-chosen centroid, spreading the initial centroids out
/// instead of clustering them together by chance.
fn init_plus_plus(points: &[&[f32]], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    let first = rng.random_range(0..points.len());
    centroids.push(points[first].to_vec());

    while centroids.len() < k {
        let weights: Vec<f32> = points
            .iter()
            .map(|p| centroids.iter().map(|c| l2_squared(p, c)).fold(f32::INFINITY, f32::min))
            .collect();

        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            // All remaining points coincide with an existing centroid; pad
            // with uniform-random choices rather than stall.
            let idx = rng.random_range(0..points.len());
            centroids.push(points[idx].to_vec());
            continue;
        }

        let target = rng.random_range(0.0..total);
        let mut acc = 0.0;
        let mut chosen = points.len() - 1;
        for (i, &w) in weights.iter().enumerate() {
            acc += w;
            if acc >= target {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen].to_vec());
    }

    centroids
}
