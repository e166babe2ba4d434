use serde::{Deserialize, Serialize};

use crate::metric::Metric;

/// A normalized parcel feature vector.
///
/// Carries the version of the normalization scheme that produced it; the
/// index rejects inserts whose version differs from its own, so vectors
/// built under different schemes can never mix in one index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    components: Vec<f32>,
    scheme_version: u32,
}

impl FeatureVector {
    #[inline]
    #[must_use]
    pub fn new(components: Vec<f32>, scheme_version: u32) -> Self {
        Self {
            components,
            scheme_version,
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.components.len()
    }

    #[inline]
    #[must_use]
    pub fn scheme_version(&self) -> u32 {
        self.scheme_version
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.components
    }

    /// Distance to another vector under the given metric.
    #[inline]
    pub fn distance_to(&self, other: &FeatureVector, metric: Metric) -> f32 {
        metric.distance(&self.components, &other.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::INDEX_METRIC;

    #[test]
    fn test_distance_to_self_is_zero() {
        let v = FeatureVector::new(vec![0.7496, 1.4160, 0.55, 0.0130], 1);
        assert_eq!(v.distance_to(&v, INDEX_METRIC), 0.0);
    }

    #[test]
    fn test_identical_components_compare_equal() {
        let a = FeatureVector::new(vec![0.1, 0.2, 0.3, 0.4], 1);
        let b = FeatureVector::new(vec![0.1, 0.2, 0.3, 0.4], 1);
        assert_eq!(a, b);
    }
}
