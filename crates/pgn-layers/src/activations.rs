//! Activation functions and softmax operations.

use libm::{expf, tanhf};
use ndarray::{Array, Array1, Array2, ArrayView1, ArrayViewMut1, Axis, Dimension, Zip};

/// Minimum array size for parallel execution.
pub const PARALLEL_THRESHOLD: usize = 16_384;

/// Gate nonlinearities used by the recurrent cells and the attention scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Tanh,
    Sigmoid,
}

/// Numerically stable logistic sigmoid.
#[inline(always)]
pub fn sigmoid_scalar(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + expf(-x))
    } else {
        let e = expf(x);
        e / (1.0 + e)
    }
}

#[inline(always)]
pub fn tanh_scalar(x: f32) -> f32 {
    tanhf(x)
}

/// Applies `activation` in place to an array of any rank.
pub fn apply_activation<D: Dimension>(arr: &mut Array<f32, D>, activation: Activation) {
    let use_parallel = arr.len() >= PARALLEL_THRESHOLD;
    match (activation, use_parallel) {
        (Activation::Tanh, true) => arr.par_mapv_inplace(tanh_scalar),
        (Activation::Tanh, false) => arr.mapv_inplace(tanh_scalar),
        (Activation::Sigmoid, true) => arr.par_mapv_inplace(sigmoid_scalar),
        (Activation::Sigmoid, false) => arr.mapv_inplace(sigmoid_scalar),
    }
}

/// Applies softmax in-place to a slice.
pub fn softmax_inplace(slice: &mut [f32]) {
    if slice.is_empty() {
        return;
    }

    let max = slice.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));

    let mut sum = 0.0;
    for v in slice.iter_mut() {
        *v = expf(*v - max);
        sum += *v;
    }

    if sum > 0.0 {
        let scale = 1.0 / sum;
        for v in slice.iter_mut() {
            *v *= scale;
        }
    }
}

/// Applies softmax along the last axis of a 2D array.
pub fn softmax_rows_inplace(logits: &mut Array2<f32>) {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        if let Some(slice) = row.as_slice_mut() {
            softmax_inplace(slice);
        } else {
            let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            row.mapv_inplace(|x| expf(x - max));
            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            }
        }
    }
}

/// Softmax over the positions where `mask != 0`.
///
/// Masked positions come out as exactly `0.0` and the unmasked ones sum to 1.
/// A row with nothing unmasked is all zeros.
pub fn masked_softmax_inplace(scores: &mut ArrayViewMut1<f32>, mask: &ArrayView1<f32>) {
    let max = scores
        .iter()
        .zip(mask.iter())
        .filter(|(_, &m)| m != 0.0)
        .fold(f32::NEG_INFINITY, |a, (&s, _)| a.max(s));

    if max == f32::NEG_INFINITY {
        scores.fill(0.0);
        return;
    }

    let mut sum = 0.0;
    Zip::from(&mut *scores).and(mask).for_each(|s, &m| {
        if m != 0.0 {
            *s = expf(*s - max);
            sum += *s;
        } else {
            *s = 0.0;
        }
    });

    if sum > 0.0 {
        let scale = 1.0 / sum;
        scores.mapv_inplace(|v| v * scale);
    }
}

/// Index of the largest value in each row.
pub fn argmax_rows(probs: &Array2<f32>) -> Array1<u32> {
    probs
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |(best_i, best), (i, &v)| {
                    if v > best {
                        (i, v)
                    } else {
                        (best_i, best)
                    }
                })
                .0 as u32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_sigmoid_scalar_symmetry() {
        assert_relative_eq!(sigmoid_scalar(0.0), 0.5);
        assert_relative_eq!(sigmoid_scalar(2.0) + sigmoid_scalar(-2.0), 1.0, epsilon = 1e-6);
        assert!(sigmoid_scalar(-200.0) >= 0.0);
        assert!(!sigmoid_scalar(-200.0).is_nan());
        assert!(!sigmoid_scalar(200.0).is_nan());
    }

    #[test]
    fn test_apply_activation_parallel_matches_serial() {
        let size = PARALLEL_THRESHOLD + 5;
        let base = Array1::from_shape_fn(size, |i| (i as f32 / size as f32) * 8.0 - 4.0);

        let mut big = base.clone();
        apply_activation(&mut big, Activation::Tanh);

        for (i, v) in big.iter().enumerate() {
            assert_relative_eq!(*v, tanh_scalar(base[i]), epsilon = 1e-7);
        }
    }

    #[test]
    fn test_softmax_inplace_basic() {
        let mut data = vec![1.0, 2.0, 3.0];
        softmax_inplace(&mut data);
        assert_relative_eq!(data[0], 0.09003057, epsilon = 1e-6);
        assert_relative_eq!(data[1], 0.24472847, epsilon = 1e-6);
        assert_relative_eq!(data[2], 0.66524094, epsilon = 1e-6);
        assert_relative_eq!(data.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_softmax_inplace_empty() {
        let mut data: Vec<f32> = vec![];
        softmax_inplace(&mut data);
        assert!(data.is_empty());
    }

    #[test]
    fn test_softmax_rows_numerical_stability() {
        let mut input = arr2(&[[1000.0, 1001.0, 1002.0], [-5.0, 0.0, 5.0]]);
        softmax_rows_inplace(&mut input);
        for row in input.rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-6);
            assert!(!row.iter().any(|x| x.is_nan()));
        }
    }

    #[test]
    fn test_masked_softmax_zeroes_padding() {
        let mut scores = arr1(&[0.5, -1.0, 0.0, 0.0]);
        let mask = arr1(&[1.0, 1.0, 0.0, 0.0]);
        masked_softmax_inplace(&mut scores.view_mut(), &mask.view());

        assert_eq!(scores[2], 0.0);
        assert_eq!(scores[3], 0.0);
        assert_relative_eq!(scores[0] + scores[1], 1.0, epsilon = 1e-6);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_masked_softmax_fully_masked_row() {
        let mut scores = arr1(&[3.0, 1.0]);
        let mask = arr1(&[0.0, 0.0]);
        masked_softmax_inplace(&mut scores.view_mut(), &mask.view());
        assert_eq!(scores, arr1(&[0.0, 0.0]));
    }

    #[test]
    fn test_argmax_rows() {
        let probs = arr2(&[[0.1, 0.7, 0.2], [0.5, 0.2, 0.3]]);
        assert_eq!(argmax_rows(&probs), arr1(&[1u32, 0]));
    }
}
