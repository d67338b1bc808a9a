use crate::error::{PgnError, PgnResult};
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

/// A CPU-based linear transformation layer (y = xW^T + b).
#[derive(Debug, Clone)]
pub struct LinearLayer {
    /// `[OutFeatures, InFeatures]`
    pub weight: Array2<f32>,
    pub bias: Option<Array1<f32>>,
}

impl LinearLayer {
    /// Creates a new `LinearLayer` from a weight matrix and an optional bias.
    ///
    /// The weight matrix must be in the `[OutFeatures, InFeatures]` layout.
    pub fn new_f32(weights: Array2<f32>, bias: impl Into<Option<Array1<f32>>>) -> Self {
        Self {
            weight: weights,
            bias: bias.into(),
        }
    }

    /// A layer whose output is always zero (plus no bias).
    pub fn zeros(out_features: usize, in_features: usize) -> Self {
        Self::new_f32(Array2::zeros((out_features, in_features)), None)
    }

    /// Glorot-uniform kernel in `[-limit, limit]`, `limit = sqrt(6 / (in + out))`,
    /// with a zero bias when `with_bias` is set.
    pub fn glorot_uniform<R: Rng + ?Sized>(
        out_features: usize,
        in_features: usize,
        with_bias: bool,
        rng: &mut R,
    ) -> Self {
        let fan = (in_features + out_features).max(1) as f32;
        let limit = (6.0 / fan).sqrt();
        let weight = Array2::random_using(
            (out_features, in_features),
            Uniform::new_inclusive(-limit, limit),
            rng,
        );
        let bias = with_bias.then(|| Array1::zeros(out_features));
        Self { weight, bias }
    }

    /// Computes `y = x @ W^T + b`.
    ///
    /// Panics if `input` does not have `in_features` columns; use [`forward`](Self::forward)
    /// when the width is not already known to match.
    #[inline]
    pub fn matmul(&self, input: &ArrayView2<f32>) -> Array2<f32> {
        let mut result = input.dot(&self.weight.t());

        if let Some(b) = &self.bias {
            result.outer_iter_mut().for_each(|mut row| row += b);
        }

        result
    }

    /// Checked `matmul` for `[batch, in_features]` input.
    pub fn forward(&self, input: &ArrayView2<f32>) -> PgnResult<Array2<f32>> {
        self.check_input("LinearLayer::forward", input.ncols())?;
        Ok(self.matmul(input))
    }

    /// Applies the layer to the last axis of a `[batch, seq, in_features]` tensor.
    pub fn forward_3d(&self, input: &ArrayView3<f32>) -> PgnResult<Array3<f32>> {
        let (batch, seq, features) = input.dim();
        self.check_input("LinearLayer::forward_3d", features)?;

        // Ensure contiguous layout before reshape
        let contiguous = input.as_standard_layout();
        let flat = contiguous
            .view()
            .into_shape_with_order((batch * seq, features))?;

        let output = self.matmul(&flat);
        Ok(output.into_shape_with_order((batch, seq, self.out_features()))?)
    }

    fn check_input(&self, context: &'static str, features: usize) -> PgnResult<()> {
        if features != self.in_features() {
            return Err(PgnError::shape_mismatch(
                context,
                self.in_features(),
                features,
            ));
        }
        Ok(())
    }

    // --- Accessors ---

    pub fn shape(&self) -> [usize; 2] {
        [self.out_features(), self.in_features()]
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn has_bias(&self) -> bool {
        self.bias.is_some()
    }
}

/// Creates a `LinearLayer` from an F32 weight matrix with no bias.
impl From<Array2<f32>> for LinearLayer {
    fn from(weights: Array2<f32>) -> Self {
        LinearLayer::new_f32(weights, None)
    }
}

/// Creates a `LinearLayer` from an F32 weight matrix and a bias.
impl From<(Array2<f32>, Array1<f32>)> for LinearLayer {
    fn from((weights, bias): (Array2<f32>, Array1<f32>)) -> Self {
        LinearLayer::new_f32(weights, Some(bias))
    }
}
