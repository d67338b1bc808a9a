use anyhow::Result;
use approx::assert_abs_diff_eq;
use ndarray::{arr1, arr2, Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::activations::sigmoid_scalar;
use crate::error::PgnError;
use crate::linear_layer::{seeded_rng, LinearLayer};
use crate::pointer::{Pointer, P_GEN_EPS};

fn pointer() -> Pointer {
    Pointer::new(6, 4, 3, &mut seeded_rng(99))
}

#[test]
fn test_p_gen_strictly_inside_unit_interval() -> Result<()> {
    let pointer = pointer();
    let mut rng = seeded_rng(1);

    for scale in [0.0f32, 1.0, 1e3, 1e6, -1e6] {
        let context = Array2::random_using((4, 6), Uniform::new(0.5f32, 1.0), &mut rng) * scale;
        let hidden = Array2::random_using((4, 4), Uniform::new(0.5f32, 1.0), &mut rng) * scale;
        let input = Array2::random_using((4, 3), Uniform::new(0.5f32, 1.0), &mut rng) * scale;

        let p = pointer.p_gen(&context, &hidden, &input)?;

        assert_eq!(p.len(), 4);
        assert!(
            p.iter().all(|&v| v > 0.0 && v < 1.0),
            "scale {} gave {:?}",
            scale,
            p
        );
    }
    Ok(())
}

#[test]
fn test_p_gen_saturates_at_clamp_bounds() -> Result<()> {
    let ones = |n: usize| LinearLayer::new_f32(Array2::ones((1, n)), None);
    let pointer = Pointer::from_parts(ones(2), ones(2), ones(2))?;
    let huge = Array2::from_elem((1, 2), 1e30f32);

    let high = pointer.p_gen(&huge, &huge, &huge)?;
    let low = pointer.p_gen(&(-&huge), &(-&huge), &(-&huge))?;

    assert_eq!(high[0], 1.0 - P_GEN_EPS);
    assert_eq!(low[0], P_GEN_EPS);
    Ok(())
}

#[test]
fn test_p_gen_opposite_overflow_stays_inside_unit_interval() -> Result<()> {
    // w_c·context overflows to +inf and w_s·hidden to -inf; their sum is NaN
    let ones = |n: usize| LinearLayer::new_f32(Array2::ones((1, n)), None);
    let pointer = Pointer::from_parts(ones(2), ones(2), ones(2))?;
    let context = Array2::from_elem((1, 2), 3e38f32);
    let hidden = Array2::from_elem((1, 2), -3e38f32);
    let input = Array2::<f32>::zeros((1, 2));

    let p = pointer.p_gen(&context, &hidden, &input)?;

    assert!(p[0] > 0.0 && p[0] < 1.0, "got {:?}", p);
    assert_abs_diff_eq!(p[0], 0.5, epsilon = 1e-6);

    // a single infinite projection saturates to the clamp bound instead
    let p = pointer.p_gen(&context, &input, &input)?;
    assert_eq!(p[0], 1.0 - P_GEN_EPS);
    Ok(())
}

#[test]
fn test_p_gen_sums_the_three_projections() -> Result<()> {
    let pointer = Pointer::from_parts(
        LinearLayer::new_f32(arr2(&[[1.0, 0.0]]), arr1(&[0.1])),
        LinearLayer::new_f32(arr2(&[[0.0, 2.0]]), arr1(&[0.2])),
        LinearLayer::new_f32(arr2(&[[-1.0, 1.0]]), arr1(&[-0.3])),
    )?;
    let hidden = arr2(&[[0.5, 9.0]]);
    let context = arr2(&[[9.0, 0.25]]);
    let input = arr2(&[[1.0, 1.5]]);

    let p = pointer.p_gen(&context, &hidden, &input)?;

    // 0.5 + 0.1 + 0.5 + 0.2 + 0.5 - 0.3
    assert_abs_diff_eq!(p[0], sigmoid_scalar(1.5), epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_p_gen_is_deterministic() -> Result<()> {
    let pointer = pointer();
    let context = Array2::from_elem((2, 6), 0.3f32);
    let hidden = Array2::from_elem((2, 4), -0.2f32);
    let input = Array2::from_elem((2, 3), 0.7f32);

    let a = pointer.p_gen(&context, &hidden, &input)?;
    let b = pointer.p_gen(&context, &hidden, &input)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn test_p_gen_rejects_batch_mismatch() {
    let pointer = pointer();
    let result = pointer.p_gen(
        &Array2::zeros((2, 6)),
        &Array2::zeros((3, 4)),
        &Array2::zeros((2, 3)),
    );
    assert!(matches!(result, Err(PgnError::ShapeMismatch { .. })));
}

#[test]
fn test_from_parts_requires_scalar_outputs() {
    let result = Pointer::from_parts(
        LinearLayer::zeros(1, 4),
        LinearLayer::zeros(2, 6),
        LinearLayer::zeros(1, 3),
    );
    assert!(matches!(result, Err(PgnError::ShapeMismatch { .. })));
}

#[test]
fn test_final_distribution_blends_and_sums_to_one() -> Result<()> {
    let p_gen = arr1(&[0.25f32, 1.0 - P_GEN_EPS]);
    let vocab = arr2(&[[0.5, 0.25, 0.25, 0.0], [0.1, 0.2, 0.3, 0.4]]);
    let attention = arr2(&[[0.5, 0.5, 0.0], [0.2, 0.3, 0.5]]);
    // id 1 repeats in row 0; id 5 is out of the decoder vocab
    let source_ids = arr2(&[[1u32, 1, 5], [0, 3, 5]]);

    let dist = Pointer::final_distribution(&p_gen, &vocab, &attention, &source_ids, 6)?;

    assert_eq!(dist.dim(), (2, 6));
    for row in dist.rows() {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
    }
    let expected_row0 = arr1(&[0.125, 0.0625 + 0.75, 0.0625, 0.0, 0.0, 0.0]);
    assert_abs_diff_eq!(dist.row(0), expected_row0.view(), epsilon = 1e-6);
    assert!(dist[[1, 5]] > 0.0);
    Ok(())
}

#[test]
fn test_final_distribution_rejects_bad_inputs() {
    let p_gen = Array1::from_elem(1, 0.5f32);
    let vocab = Array2::from_elem((1, 4), 0.25f32);
    let attention = Array2::from_elem((1, 2), 0.5f32);

    let too_small = Pointer::final_distribution(&p_gen, &vocab, &attention, &arr2(&[[0u32, 1]]), 3);
    assert!(matches!(too_small, Err(PgnError::ShapeMismatch { .. })));

    let id_out_of_range = Pointer::final_distribution(&p_gen, &vocab, &attention, &arr2(&[[0u32, 4]]), 4);
    assert!(matches!(id_out_of_range, Err(PgnError::ShapeMismatch { .. })));

    let misaligned = Pointer::final_distribution(&p_gen, &vocab, &attention, &arr2(&[[0u32, 1, 2]]), 4);
    assert!(matches!(misaligned, Err(PgnError::ShapeMismatch { .. })));
}
