//! Distance metrics shared by the reducer and the clusterer.

use serde::{Deserialize, Serialize};

/// Metric used to compare two rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, range [0, 2]. Zero vectors are treated as orthogonal.
    #[default]
    Cosine,
    /// Straight-line L2 distance.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two equal-length rows.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Euclidean => euclidean(a, b),
        }
    }
}

/// Raw cosine similarity in [-1, 1]. Returns 0.0 for zero-magnitude input (no NaN).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    (dot / (mag_a.sqrt() * mag_b.sqrt())).clamp(-1.0, 1.0)
}

/// Euclidean distance.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance_bounds() {
        let a = [1.0, 0.0];
        assert!(DistanceMetric::Cosine.distance(&a, &[2.0, 0.0]).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &[0.0, 3.0]) - 1.0).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_orthogonal() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_euclidean() {
        assert!((euclidean(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }
}
