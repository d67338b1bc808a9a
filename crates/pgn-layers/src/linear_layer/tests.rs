use approx::assert_abs_diff_eq;
use ndarray::{arr1, arr2, Array3};

use crate::error::PgnError;
use crate::linear_layer::{seeded_rng, LinearLayer};

// Helper to create a standard test layer
fn create_f32_layer() -> LinearLayer {
    // Weights: 2x2 matrix
    // [[1.0, 2.0],
    //  [3.0, 4.0]]
    let weights = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
    LinearLayer::new_f32(weights, None)
}

#[test]
fn test_matmul_f32_basic() {
    let layer = create_f32_layer();
    let input = arr2(&[[1.0, 1.0]]);

    // Expected: Input @ Weights^T
    // [1*1 + 1*2, 1*3 + 1*4] = [3.0, 7.0]
    let output = layer.matmul(&input.view());

    assert_eq!(output, arr2(&[[3.0, 7.0]]));
}

#[test]
fn test_matmul_f32_with_bias() {
    let weights = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
    let bias = arr1(&[10.0, 20.0]);
    let layer = LinearLayer::from((weights, bias));

    let input = arr2(&[[1.0, 1.0]]);
    let output = layer.matmul(&input.view());

    assert_eq!(output, arr2(&[[13.0, 27.0]]));
}

#[test]
fn test_forward_rejects_wrong_width() {
    let layer = create_f32_layer();
    let input = arr2(&[[1.0, 1.0, 1.0]]);

    match layer.forward(&input.view()) {
        Err(PgnError::ShapeMismatch { expected, actual, .. }) => {
            assert_eq!(expected, "2");
            assert_eq!(actual, "3");
        }
        other => panic!("expected shape mismatch, got {:?}", other),
    }
}

#[test]
fn test_forward_3d_matches_row_wise_matmul() -> anyhow::Result<()> {
    let layer = LinearLayer::new_f32(arr2(&[[1.0, 0.0], [0.5, -1.0], [2.0, 2.0]]), arr1(&[0.0, 1.0, -1.0]));
    let input = Array3::from_shape_fn((2, 3, 2), |(b, t, f)| (b * 6 + t * 2 + f) as f32);

    let output = layer.forward_3d(&input.view())?;
    assert_eq!(output.shape(), &[2, 3, 3]);

    for b in 0..2 {
        let rows = input.index_axis(ndarray::Axis(0), b);
        let expected = layer.matmul(&rows);
        assert_abs_diff_eq!(output.index_axis(ndarray::Axis(0), b), expected.view(), epsilon = 1e-6);
    }
    Ok(())
}

#[test]
fn test_glorot_uniform_bounds_and_determinism() {
    let mut rng_a = seeded_rng(7);
    let mut rng_b = seeded_rng(7);
    let a = LinearLayer::glorot_uniform(4, 6, true, &mut rng_a);
    let b = LinearLayer::glorot_uniform(4, 6, true, &mut rng_b);

    let limit = (6.0f32 / 10.0).sqrt();
    assert!(a.weight.iter().all(|w| w.abs() <= limit));
    assert_eq!(a.weight, b.weight);
    assert_eq!(a.shape(), [4, 6]);
    assert_eq!(a.bias, Some(arr1(&[0.0, 0.0, 0.0, 0.0])));
}

#[test]
fn test_zeros_layer_has_no_bias() {
    let layer = LinearLayer::zeros(3, 2);
    assert!(!layer.has_bias());
    assert_eq!(layer.in_features(), 2);
    assert_eq!(layer.out_features(), 3);
}
