// pooling.rs — Attention-mask-aware mean pooling and L2 normalization.
//
// Works on plain row-major containers (N token rows of D floats, mask of N
// entries) so the broadcast-and-reduce shape is explicit instead of hidden
// behind tensor broadcasting.

use anyhow::{bail, ensure};

use crate::config;

/// Mean-pool token embeddings into one D-dimensional vector.
///
/// Each row is weighted by its mask entry (1 = real token, 0 = padding),
/// summed, and divided by the number of unmasked tokens. `None` means every
/// position is valid. The divisor is floored at `MEAN_POOL_EPS`, so an
/// all-zero mask yields the (near-zero) numerator scaled by 1/eps instead of
/// a division error.
pub fn mean_pool(token_embeddings: &[Vec<f32>], attention_mask: Option<&[u32]>) -> anyhow::Result<Vec<f32>> {
    ensure!(!token_embeddings.is_empty(), "mean_pool: no token embeddings");
    let dims = token_embeddings[0].len();
    if let Some(mask) = attention_mask {
        ensure!(
            mask.len() == token_embeddings.len(),
            "mean_pool: mask length {} != token count {}",
            mask.len(),
            token_embeddings.len()
        );
    }

    let mut summed = vec![0.0f32; dims];
    let mut count = 0.0f32;
    for (i, row) in token_embeddings.iter().enumerate() {
        if row.len() != dims {
            bail!("mean_pool: row {} has {} dims, expected {}", i, row.len(), dims);
        }
        let m = attention_mask.map_or(1, |mask| mask[i]);
        if m == 0 {
            continue;
        }
        for (acc, v) in summed.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1.0;
    }

    let divisor = count.max(config::embedding::MEAN_POOL_EPS);
    for v in summed.iter_mut() {
        *v /= divisor;
    }
    Ok(summed)
}

/// Scale a vector to unit Euclidean length.
///
/// The norm is floored at `L2_NORM_EPS`, so a vector with norm below the
/// floor (in particular the all-zero vector) comes back unchanged rather
/// than raising a division error. That edge case is a policy choice carried
/// over from the reference tool, not a mathematical requirement.
pub fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    let divisor = norm.max(config::embedding::L2_NORM_EPS);
    vector.iter().map(|v| v / divisor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_mean_pool_averages_valid_tokens_only() {
        let rows = vec![
            vec![2.0, 4.0],
            vec![100.0, 100.0], // padding, must not contribute
            vec![4.0, 8.0],
        ];
        let pooled = mean_pool(&rows, Some(&[1, 0, 1])).unwrap();
        assert_eq!(pooled, vec![3.0, 6.0]);
    }

    #[test]
    fn test_mean_pool_missing_mask_means_all_valid() {
        let rows = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let pooled = mean_pool(&rows, None).unwrap();
        assert_eq!(pooled, vec![0.5, 0.5]);
    }

    #[test]
    fn test_mean_pool_all_zero_mask_no_division_error() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let pooled = mean_pool(&rows, Some(&[0, 0])).unwrap();
        // Numerator is all zeros (every row masked out), divided by the eps floor.
        assert_eq!(pooled, vec![0.0, 0.0]);
        assert!(pooled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mean_pool_rejects_shape_mismatch() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(mean_pool(&rows, None).is_err());
        let rows = vec![vec![1.0, 2.0]];
        assert!(mean_pool(&rows, Some(&[1, 1])).is_err());
        assert!(mean_pool(&[], None).is_err());
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let v = vec![3.0, -4.0, 12.0];
        let n = l2_normalize(&v);
        assert!((norm(&n) - 1.0).abs() < 1e-6);
        // Direction preserved
        assert!((n[0] * 13.0 - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let v = vec![0.0, 0.0, 0.0];
        assert_eq!(l2_normalize(&v), v);
    }

    #[test]
    fn test_pool_then_normalize_reference_scenario() {
        // "hello world": 2 tokens, identity-ish embeddings.
        let rows = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let pooled = mean_pool(&rows, Some(&[1, 1])).unwrap();
        assert_eq!(pooled, vec![0.5, 0.5]);
        let unit = l2_normalize(&pooled);
        assert!((unit[0] - 0.7071).abs() < 1e-4);
        assert!((unit[1] - 0.7071).abs() < 1e-4);
    }
}
