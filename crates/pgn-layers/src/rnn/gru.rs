use crate::activations::{apply_activation, Activation};
use crate::error::PgnResult;
use crate::linear_layer::LinearLayer;
use ndarray::{s, Array2, ArrayView2};
use ndarray_rand::rand::Rng;

use super::check_gate_projections;

/// Gated recurrent unit with the reset gate applied after the recurrent
/// projection:
///
/// ```text
/// z  = σ(x·Wz + h·Uz)
/// r  = σ(x·Wr + h·Ur)
/// h~ = tanh(x·Wh + r ⊙ (h·Uh))
/// h' = z ⊙ h + (1 - z) ⊙ h~
/// ```
///
/// Both projections carry a bias. Gate blocks are packed `[z, r, h]` along
/// the output axis.
#[derive(Debug, Clone)]
pub struct GruCell {
    pub input_proj: LinearLayer,
    pub recurrent_proj: LinearLayer,
    units: usize,
}

impl GruCell {
    pub fn new<R: Rng + ?Sized>(input_dim: usize, units: usize, rng: &mut R) -> Self {
        Self {
            input_proj: LinearLayer::glorot_uniform(3 * units, input_dim, true, rng),
            recurrent_proj: LinearLayer::glorot_uniform(3 * units, units, true, rng),
            units,
        }
    }

    /// Wraps existing projections; `units` is taken from `recurrent_proj`.
    pub fn from_parts(input_proj: LinearLayer, recurrent_proj: LinearLayer) -> PgnResult<Self> {
        let cell = Self {
            units: recurrent_proj.in_features(),
            input_proj,
            recurrent_proj,
        };
        cell.validate()?;
        Ok(cell)
    }

    pub(crate) fn validate(&self) -> PgnResult<()> {
        check_gate_projections(
            "GruCell projections",
            &self.input_proj,
            &self.recurrent_proj,
            3,
            self.units,
        )
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn input_dim(&self) -> usize {
        self.input_proj.in_features()
    }

    /// Shapes are validated by [`RnnCell::step`](super::RnnCell::step).
    pub(crate) fn step(&self, x: &ArrayView2<f32>, h: &Array2<f32>) -> Array2<f32> {
        let u = self.units;
        let gx = self.input_proj.matmul(x);
        let gh = self.recurrent_proj.matmul(&h.view());

        let mut z = &gx.slice(s![.., 0..u]) + &gh.slice(s![.., 0..u]);
        apply_activation(&mut z, Activation::Sigmoid);

        let mut r = &gx.slice(s![.., u..2 * u]) + &gh.slice(s![.., u..2 * u]);
        apply_activation(&mut r, Activation::Sigmoid);

        let mut candidate = &gx.slice(s![.., 2 * u..]) + &(&r * &gh.slice(s![.., 2 * u..]));
        apply_activation(&mut candidate, Activation::Tanh);

        &z * h + &((1.0 - &z) * &candidate)
    }
}
