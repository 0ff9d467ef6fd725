//! Tests for the strided tensor engine
//!
//! This file covers:
//! - Construction, indexing and element counts
//! - Elementwise identities (add/sub inverse)
//! - In-place transpose and strided access
//! - Matrix products through transposed views
//! - Reductions and normalization

use approx::assert_relative_eq;
use ndnet::tensor::{self, Tensor};
use ndnet::utils::SimpleRng;
use ndnet::Error;

fn tensor(shape: &[usize], data: &[f32]) -> Tensor {
    Tensor::from_vec(shape, data.to_vec()).unwrap()
}

// ============================================================================
// Construction Tests
// ============================================================================

mod construction_tests {
    use super::*;

    #[test]
    fn test_zeros_has_row_major_strides() {
        let t = Tensor::zeros(&[2, 3, 4]);
        assert_eq!(t.rank(), 3);
        assert_eq!(t.size(), 24);
        assert_eq!(t.strides(), &[12, 4, 1]);
        assert!(t.is_contiguous());
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let err = Tensor::from_vec(&[2, 2], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, Error::ElementCount { expected: 4, got: 3, .. }));
    }

    #[test]
    fn test_get_set_by_index() {
        let mut t = Tensor::zeros(&[2, 3]);
        t.set(&[1, 2], 7.5).unwrap();
        assert_eq!(t.get(&[1, 2]).unwrap(), 7.5);
        assert_eq!(t.data()[5], 7.5);
        assert!(t.get(&[2, 0]).is_err());
        assert!(t.get(&[0]).is_err());
    }

    #[test]
    fn test_randomize_is_seeded() {
        let mut a = Tensor::zeros(&[4, 4]);
        let mut b = Tensor::zeros(&[4, 4]);
        a.randomize(&mut SimpleRng::new(9));
        b.randomize(&mut SimpleRng::new(9));
        assert_eq!(a, b);
        assert!(a.data().iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_he_initialize_scale() {
        let mut w = Tensor::zeros(&[64, 200]);
        w.he_initialize(&mut SimpleRng::new(3)).unwrap();
        let n = w.size() as f32;
        let mean = tensor::sum(&w) / n;
        let var = w.data().iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
        // Expected variance 2 / fan_in = 0.01.
        assert_relative_eq!(var, 0.01, max_relative = 0.15);
        assert!(Tensor::zeros(&[3]).he_initialize(&mut SimpleRng::new(1)).is_err());
    }
}

// ============================================================================
// Elementwise Tests
// ============================================================================

mod elementwise_tests {
    use super::*;

    #[test]
    fn test_add_then_sub_is_identity() {
        let mut rng = SimpleRng::new(21);
        let mut a = Tensor::zeros(&[3, 5]);
        let mut b = Tensor::zeros(&[3, 5]);
        a.randomize(&mut rng);
        b.randomize(&mut rng);

        let mut sum = Tensor::zeros(&[3, 5]);
        let mut back = Tensor::zeros(&[3, 5]);
        tensor::add(&a, &b, &mut sum).unwrap();
        tensor::sub(&sum, &b, &mut back).unwrap();

        for (x, y) in back.data().iter().zip(a.data()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_mismatched_shapes_are_rejected() {
        let a = Tensor::zeros(&[2, 2]);
        let b = Tensor::zeros(&[4, 1]);
        let mut out = Tensor::zeros(&[2, 2]);
        assert!(matches!(tensor::mul(&a, &b, &mut out), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_add_assign_accumulates() {
        let mut acc = tensor(&[2], &[1.0, 2.0]);
        tensor::add_assign(&mut acc, &tensor(&[2], &[0.5, -2.0])).unwrap();
        assert_eq!(acc.data(), &[1.5, 0.0]);
    }
}

// ============================================================================
// Transpose and View Tests
// ============================================================================

mod transpose_tests {
    use super::*;

    #[test]
    fn test_transpose_swaps_shape_and_strides() {
        let mut t = tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        t.transpose().unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.strides(), &[1, 3]);
        assert!(!t.is_contiguous());
        assert_eq!(t.get(&[2, 1]).unwrap(), 6.0);
        assert_eq!(t.get(&[0, 1]).unwrap(), 4.0);
    }

    #[test]
    fn test_transpose_twice_is_identity() {
        let original = tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut t = original.clone();
        t.transpose().unwrap();
        t.transpose().unwrap();
        assert_eq!(t, original);
    }

    #[test]
    fn test_transpose_requires_rank_two() {
        let mut t = Tensor::zeros(&[2, 2, 2]);
        assert!(matches!(t.transpose(), Err(Error::RankMismatch { .. })));
    }

    #[test]
    fn test_to_contiguous_materializes_logical_order() {
        let mut t = tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        t.transpose().unwrap();
        let c = t.to_contiguous();
        assert!(c.is_contiguous());
        assert_eq!(c.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_reshape_needs_contiguous_storage() {
        let mut t = tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        t.reshape(&[6, 1]).unwrap();
        assert_eq!(t.shape(), &[6, 1]);
        assert!(t.reshape(&[4, 2]).is_err());

        let mut transposed = tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        transposed.transpose().unwrap();
        assert!(transposed.reshape(&[6]).is_err());
    }

    #[test]
    fn test_plane_view_of_rank_three() {
        let t = tensor(&[2, 2, 2], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let plane = t.plane(&[1]).unwrap();
        assert_eq!(plane.shape(), [2, 2]);
        assert_eq!(plane.to_tensor().data(), &[5.0, 6.0, 7.0, 8.0]);
        assert!(t.plane(&[2]).is_err());
    }
}

// ============================================================================
// Matrix Product Tests
// ============================================================================

mod dot_tests {
    use super::*;

    #[test]
    fn test_dot_matrix_vector() {
        let w = tensor(&[2, 3], &[1.0, 0.0, 2.0, -1.0, 3.0, 1.0]);
        let x = Tensor::column(&[1.0, 2.0, 3.0]);
        let mut out = Tensor::zeros(&[2, 1]);
        tensor::dot(&w, &x, &mut out).unwrap();
        assert_eq!(out.data(), &[7.0, 8.0]);
    }

    #[test]
    fn test_dot_with_transposed_operand_matches_copy() {
        let a = tensor(&[3, 2], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = tensor(&[3, 2], &[0.5, -1.0, 2.0, 0.0, 1.0, 1.0]);

        let mut via_view = Tensor::zeros(&[2, 2]);
        tensor::dot_views(a.t().unwrap(), b.matrix().unwrap(), &mut via_view).unwrap();

        let mut at = a.clone();
        at.transpose().unwrap();
        let mut via_transpose = Tensor::zeros(&[2, 2]);
        tensor::dot(&at.to_contiguous(), &b, &mut via_transpose).unwrap();

        assert_eq!(via_view.data(), via_transpose.data());
        assert_eq!(via_view.data(), &[11.5, 4.0, 15.0, 4.0]);
    }

    #[test]
    fn test_dot_inner_dimension_mismatch() {
        let a = Tensor::zeros(&[2, 3]);
        let b = Tensor::zeros(&[2, 1]);
        let mut out = Tensor::zeros(&[2, 1]);
        assert!(matches!(tensor::dot(&a, &b, &mut out), Err(Error::ShapeMismatch { .. })));
    }
}

// ============================================================================
// Reduction Tests
// ============================================================================

mod reduction_tests {
    use super::*;

    #[test]
    fn test_argmax_first_wins() {
        let t = tensor(&[4], &[3.0, 5.0, 5.0, 1.0]);
        assert_eq!(tensor::argmax(&t), 1);
        assert_eq!(tensor::max(&t), 5.0);
        assert_eq!(tensor::sum(&t), 14.0);
    }

    #[test]
    fn test_normalize_sums_to_one() {
        let t = tensor(&[3], &[1.0, 2.0, 5.0]);
        let mut out = Tensor::zeros(&[3]);
        tensor::normalize(&t, &mut out).unwrap();
        assert_relative_eq!(tensor::sum(&out), 1.0, epsilon = 1e-6);
        assert_relative_eq!(out.data()[2], 0.625, epsilon = 1e-6);
    }

    #[test]
    fn test_stack_concatenates_in_order() {
        let a = tensor(&[2], &[1.0, 2.0]);
        let b = tensor(&[2], &[3.0, 4.0]);
        let mut out = Tensor::zeros(&[2, 2]);
        Tensor::stack(&[&a, &b], &mut out).unwrap();
        assert_eq!(out.data(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(Tensor::stack(&[&a], &mut out).is_err());
    }
}
