//! Mean pooling and L2 normalization of chunk vectors

use crate::error::{MatcherError, Result};
use crate::model::EmbeddingVector;

/// Average chunk vectors element-wise and scale the mean to unit length.
///
/// A zero mean comes back as the all-zero vector.
pub fn mean_pool_normalize(vectors: &[EmbeddingVector]) -> Result<EmbeddingVector> {
    let first = vectors.first().ok_or_else(|| {
        MatcherError::Validation("Cannot pool an empty set of chunk vectors".to_string())
    })?;

    let dim = first.dim();
    if dim == 0 {
        return Err(MatcherError::Validation(
            "Chunk vectors must have at least one dimension".to_string(),
        ));
    }

    let mut sum = vec![0.0f64; dim];
    for (idx, vector) in vectors.iter().enumerate() {
        if vector.dim() != dim {
            return Err(MatcherError::Validation(format!(
                "Chunk vector {} has dimension {}, expected {}",
                idx,
                vector.dim(),
                dim
            )));
        }
        for (acc, value) in sum.iter_mut().zip(vector.as_slice()) {
            *acc += *value as f64;
        }
    }

    let count = vectors.len() as f64;
    let mean: Vec<f64> = sum.into_iter().map(|v| v / count).collect();

    Ok(EmbeddingVector::new(l2_normalize(&mean)))
}

/// Scale to unit length, accumulating in f64.
pub fn l2_normalize(values: &[f64]) -> Vec<f32> {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v / norm) as f32).collect()
}

pub fn l2_norm(values: &[f32]) -> f32 {
    values
        .iter()
        .map(|v| (*v as f64) * (*v as f64))
        .sum::<f64>()
        .sqrt() as f32
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(MatcherError::Validation(format!(
            "Dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum::<f64>() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec())
    }

    #[test]
    fn test_mean_pool_is_unit_length() {
        let pooled = mean_pool_normalize(&[v(&[3.0, 0.0, 1.0]), v(&[1.0, 4.0, 1.0])]).unwrap();
        assert_eq!(pooled.dim(), 3);
        assert!((pooled.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_vector_is_normalized() {
        let pooled = mean_pool_normalize(&[v(&[0.6, 0.8])]).unwrap();
        assert!((pooled.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((pooled.as_slice()[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_opposing_vectors_pool_to_zero() {
        let pooled = mean_pool_normalize(&[v(&[1.0, -2.0]), v(&[-1.0, 2.0])]).unwrap();
        assert_eq!(pooled.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_empty_and_mixed_dimensions_rejected() {
        assert!(matches!(
            mean_pool_normalize(&[]),
            Err(MatcherError::Validation(_))
        ));
        assert!(matches!(
            mean_pool_normalize(&[v(&[1.0, 0.0]), v(&[1.0])]),
            Err(MatcherError::Validation(_))
        ));
    }

    #[test]
    fn test_dot_checks_dimensions() {
        assert!((dot(&[0.6, 0.8], &[0.6, 0.8]).unwrap() - 1.0).abs() < 1e-6);
        assert!(dot(&[0.6, 0.8], &[1.0]).is_err());
    }
}
