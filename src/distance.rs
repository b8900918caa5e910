use ndarray::ArrayView1;

use crate::error::{RankError, Result};

/// Distance metric used for exact ground-truth search and candidate scoring.
///
/// Every metric is oriented so that smaller means closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance. Range [0, inf).
    Euclidean,
    /// Angle between the vectors in radians. Range [0, pi].
    Angular,
    /// Negated inner product, so a larger dot product ranks first.
    InnerProduct,
}

impl DistanceMetric {
    /// Compute the distance between two vectors using this metric.
    pub fn compute(&self, a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> Result<f32> {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Angular => angular_distance(a, b),
            DistanceMetric::InnerProduct => inner_product_distance(a, b),
        }
    }
}

fn check_dims(a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> Result<()> {
    if a.len() != b.len() {
        return Err(RankError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(())
}

/// Euclidean (L2) distance between two vectors.
pub fn euclidean_distance(a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> Result<f32> {
    check_dims(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt())
}

/// Angular distance: `acos(cos(a, b))`.
///
/// Fails with [`RankError::ZeroNorm`] when either vector has zero length.
/// Small but non-zero vectors are fine. The cosine is clamped to [-1, 1] so
/// rounding never produces NaN.
pub fn angular_distance(a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> Result<f32> {
    check_dims(a, b)?;
    let norm_a = a.dot(a).sqrt();
    let norm_b = b.dot(b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(RankError::ZeroNorm);
    }
    // Divide one norm at a time; the product of two tiny norms can underflow.
    let cosine = a.dot(b) / norm_a / norm_b;
    if !cosine.is_finite() {
        return Err(RankError::ZeroNorm);
    }
    Ok(cosine.clamp(-1.0, 1.0).acos())
}

/// Negated dot product.
pub fn inner_product_distance(a: &ArrayView1<f32>, b: &ArrayView1<f32>) -> Result<f32> {
    check_dims(a, b)?;
    Ok(-a.dot(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_euclidean() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        let d = euclidean_distance(&a.view(), &b.view()).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_angular_orthogonal() {
        let a = array![1.0, 0.0];
        let b = array![0.0, 1.0];
        let d = angular_distance(&a.view(), &b.view()).unwrap();
        assert!((d - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_angular_identical_is_zero() {
        let a = array![0.3, 0.4, 0.5];
        let d = angular_distance(&a.view(), &a.view()).unwrap();
        assert!(d.abs() < 1e-3);
    }

    #[test]
    fn test_angular_zero_norm() {
        let a = array![0.0, 0.0, 0.0];
        let b = array![1.0, 2.0, 3.0];
        assert!(matches!(
            angular_distance(&a.view(), &b.view()),
            Err(RankError::ZeroNorm)
        ));
    }

    #[test]
    fn test_angular_small_vectors_are_not_zero_norm() {
        let a = array![1e-4, 0.0];
        let b = array![0.0, 1e-4];
        let d = angular_distance(&a.view(), &b.view()).unwrap();
        assert!((d - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        let c = array![2e-4, 0.0];
        let d = angular_distance(&a.view(), &c.view()).unwrap();
        assert!(d.abs() < 1e-3);
    }

    #[test]
    fn test_inner_product_ranks_by_descending_dot() {
        let q = array![1.0, 1.0];
        let near = array![2.0, 2.0];
        let far = array![0.5, 0.0];
        let d_near = inner_product_distance(&q.view(), &near.view()).unwrap();
        let d_far = inner_product_distance(&q.view(), &far.view()).unwrap();
        assert!(d_near < d_far);
        assert_eq!(d_near, -4.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = array![1.0, 2.0];
        let b = array![1.0, 2.0, 3.0];
        for metric in [
            DistanceMetric::Euclidean,
            DistanceMetric::Angular,
            DistanceMetric::InnerProduct,
        ] {
            assert!(matches!(
                metric.compute(&a.view(), &b.view()),
                Err(RankError::DimensionMismatch { expected: 2, got: 3 })
            ));
        }
    }
}
