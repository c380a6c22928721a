//! Distance metrics for vector similarity.
//!
//! All kernels operate on equal-length `&[f32]` views and never allocate.
//! Mismatched lengths are a programming error: callers validate dimension
//! before reaching these functions (see [`crate::database::Database`]),
//! so the kernels themselves assert rather than return a `Result`.

use serde::{Deserialize, Serialize};

/// Distance metric selectable per database.
///
/// All three produce a score where **smaller means more similar** — this is
/// the contract `calculate` normalizes to, independent of whether the
/// underlying kernel is naturally a similarity (cosine, dot product) or a
/// distance (L2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance. Range `[0, ∞)`.
    L2,
    /// `1 − cosine_similarity`, clamped to `[0, 2]`.
    Cosine,
    /// Negated dot product, `-dot(a, b)`. Smaller is more similar.
    DotProduct,
}

impl DistanceMetric {
    /// Computes the distance between `a` and `b` under this metric.
    ///
    /// # Panics
    ///
    /// Panics if `a.len() != b.len()`; this indicates a caller bug, not a
    /// data condition (see module docs).
    #[inline]
    pub fn calculate(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "distance kernels require equal-length vectors");
        match self {
            DistanceMetric::L2 => l2(a, b),
            DistanceMetric::Cosine => cosine(a, b),
            DistanceMetric::DotProduct => negated_dot(a, b),
        }
    }
}

/// Squared L2 distance. Used internally wherever only the relative ordering
/// of distances matters, to skip the `sqrt`.
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean (L2) distance: `sqrt(Σ (a_i − b_i)²)`.
#[inline]
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    l2_squared(a, b).sqrt()
}

/// Sum of element-wise products.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2 norm (magnitude) of a vector.
#[inline]
pub fn magnitude(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Minimum norm below which a vector is treated as the zero vector for
/// cosine purposes (see [`cosine`]).
const COSINE_NORM_EPSILON: f32 = 1e-10;

/// `1 − dot(a,b) / (‖a‖·‖b‖)`, with the ratio clamped to `[-1, 1]` before
/// subtraction so the result always lies in `[0, 2]`.
///
/// If either norm is below [`COSINE_NORM_EPSILON`], returns `1.0` (maximum
/// dissimilarity) rather than dividing by a near-zero magnitude.
#[inline]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a < COSINE_NORM_EPSILON || mag_b < COSINE_NORM_EPSILON {
        return 1.0;
    }
    let cos_sim = (dot(a, b) / (mag_a * mag_b)).clamp(-1.0, 1.0);
    1.0 - cos_sim
}

/// `-dot(a, b)`. Smaller is more similar.
#[inline]
pub fn negated_dot(a: &[f32], b: &[f32]) -> f32 {
    -dot(a, b)
}

/// Normalizes `v` to unit length in place. No-op if the magnitude is zero.
pub fn normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag > 0.0 {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
}
