use serde::{Deserialize, Serialize};

/// Distance metric for the similarity index.
///
/// The index is built under exactly one metric and queried under the same
/// one. Both paths consume [`INDEX_METRIC`]; re-specifying the metric at a
/// call site is what silently degrades an index scan into a full scan, so
/// nothing in this crate takes a metric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Squared L2. Cheapest to evaluate and order-equivalent to L2.
    SquaredEuclidean,
    Euclidean,
    Cosine,
}

/// The single metric shared by the index build path and the query path.
pub const INDEX_METRIC: Metric = Metric::SquaredEuclidean;

impl Metric {
    /// Distance between two equal-length slices. Mismatched dimensions
    /// compare as infinitely far apart.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return f32::INFINITY;
        }
        match self {
            Metric::SquaredEuclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            Metric::Euclidean => {
                let sq: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum();
                sq.sqrt()
            }
            Metric::Cosine => {
                let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }

    /// Similarity score for a distance under this metric.
    ///
    /// `1 / (1 + d)`: range (0, 1], strictly decreasing in distance, so
    /// ordering by similarity descending is exactly ordering by distance
    /// ascending.
    #[inline]
    #[must_use]
    pub fn similarity(&self, distance: f32) -> f32 {
        1.0 / (1.0 + distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_euclidean() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((Metric::SquaredEuclidean.distance(&a, &b) - 25.0).abs() < 1e-6);
        assert!((Metric::Euclidean.distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_is_infinite() {
        assert_eq!(
            Metric::SquaredEuclidean.distance(&[1.0], &[1.0, 2.0]),
            f32::INFINITY
        );
    }

    #[test]
    fn test_similarity_reverses_distance_order() {
        let m = INDEX_METRIC;
        let d1 = 0.1_f32;
        let d2 = 0.9_f32;
        assert!(d1 < d2);
        assert!(m.similarity(d1) > m.similarity(d2));
        // Identical vectors score exactly 1.0.
        assert_eq!(m.similarity(0.0), 1.0);
    }
}
