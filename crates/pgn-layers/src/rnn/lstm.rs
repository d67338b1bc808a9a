use crate::activations::{apply_activation, tanh_scalar, Activation};
use crate::error::PgnResult;
use crate::linear_layer::LinearLayer;
use ndarray::{s, Array2, ArrayView2};
use ndarray_rand::rand::Rng;

use super::check_gate_projections;

/// Long short-term memory cell. Gate blocks are packed `[i, f, g, o]`:
///
/// ```text
/// c' = σ(f) ⊙ c + σ(i) ⊙ tanh(g)
/// h' = σ(o) ⊙ tanh(c')
/// ```
#[derive(Debug, Clone)]
pub struct LstmCell {
    pub input_proj: LinearLayer,
    pub recurrent_proj: LinearLayer,
    units: usize,
}

impl LstmCell {
    /// Glorot-uniform kernels; the forget-gate bias starts at 1.0.
    pub fn new<R: Rng + ?Sized>(input_dim: usize, units: usize, rng: &mut R) -> Self {
        let mut input_proj = LinearLayer::glorot_uniform(4 * units, input_dim, true, rng);
        if let Some(bias) = input_proj.bias.as_mut() {
            bias.slice_mut(s![units..2 * units]).fill(1.0);
        }
        // the recurrent side carries no bias; the input side owns it
        let recurrent_proj = LinearLayer::glorot_uniform(4 * units, units, false, rng);
        Self {
            input_proj,
            recurrent_proj,
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
            "LstmCell projections",
            &self.input_proj,
            &self.recurrent_proj,
            4,
            self.units,
        )
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn input_dim(&self) -> usize {
        self.input_proj.in_features()
    }

    pub(crate) fn step(
        &self,
        x: &ArrayView2<f32>,
        h: &Array2<f32>,
        c: &Array2<f32>,
    ) -> (Array2<f32>, Array2<f32>) {
        let u = self.units;
        let gates = self.input_proj.matmul(x) + self.recurrent_proj.matmul(&h.view());

        let mut i = gates.slice(s![.., 0..u]).to_owned();
        let mut f = gates.slice(s![.., u..2 * u]).to_owned();
        let mut g = gates.slice(s![.., 2 * u..3 * u]).to_owned();
        let mut o = gates.slice(s![.., 3 * u..]).to_owned();
        apply_activation(&mut i, Activation::Sigmoid);
        apply_activation(&mut f, Activation::Sigmoid);
        apply_activation(&mut g, Activation::Tanh);
        apply_activation(&mut o, Activation::Sigmoid);

        let new_c = &f * c + &(&i * &g);
        let new_h = &o * &new_c.mapv(tanh_scalar);
        (new_h, new_c)
    }
}
