//! Recurrent cells shared by the encoder and decoder.
//!
//! Two cell kinds are supported: a gated-recurrent unit carrying a single
//! hidden vector, and a memory-cell (LSTM) unit carrying a hidden vector and a
//! cell vector. Everything else is rejected when the name is parsed.

mod gru;
mod lstm;

use std::fmt;
use std::str::FromStr;

use crate::error::{PgnError, PgnResult};
use crate::linear_layer::LinearLayer;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};

pub use gru::GruCell;
pub use lstm::LstmCell;


/// Supported recurrent cell kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RnnType {
    #[default]
    Gru,
    Lstm,
}

impl RnnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RnnType::Gru => "gru",
            RnnType::Lstm => "lstm",
        }
    }

    /// Tensors in one direction's state: `h` for GRU, `(h, c)` for LSTM.
    pub fn state_tensors(&self) -> usize {
        match self {
            RnnType::Gru => 1,
            RnnType::Lstm => 2,
        }
    }
}

impl FromStr for RnnType {
    type Err = PgnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gru" | "gated-recurrent" => Ok(RnnType::Gru),
            "lstm" | "memory-cell" => Ok(RnnType::Lstm),
            _ => Err(PgnError::UnsupportedRnnType(s.to_string())),
        }
    }
}

impl TryFrom<String> for RnnType {
    type Error = PgnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RnnType> for String {
    fn from(value: RnnType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RnnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State carried between recurrent steps. Every tensor is `[batch, units]`.
#[derive(Debug, Clone, PartialEq)]
pub enum RecurrentState {
    Gru(Array2<f32>),
    Lstm { h: Array2<f32>, c: Array2<f32> },
}

impl RecurrentState {
    pub fn zeros(rnn_type: RnnType, batch_size: usize, units: usize) -> Self {
        let zeros = Array2::zeros((batch_size, units));
        match rnn_type {
            RnnType::Gru => RecurrentState::Gru(zeros),
            RnnType::Lstm => RecurrentState::Lstm {
                h: zeros.clone(),
                c: zeros,
            },
        }
    }

    pub fn rnn_type(&self) -> RnnType {
        match self {
            RecurrentState::Gru(_) => RnnType::Gru,
            RecurrentState::Lstm { .. } => RnnType::Lstm,
        }
    }

    /// The hidden vector `h` (the cell vector of an LSTM is not exposed here).
    pub fn hidden(&self) -> &Array2<f32> {
        match self {
            RecurrentState::Gru(h) => h,
            RecurrentState::Lstm { h, .. } => h,
        }
    }

    /// All state tensors, `h` before `c`.
    pub fn tensors(&self) -> Vec<&Array2<f32>> {
        match self {
            RecurrentState::Gru(h) => vec![h],
            RecurrentState::Lstm { h, c } => vec![h, c],
        }
    }

    pub fn batch_size(&self) -> usize {
        self.hidden().nrows()
    }

    pub fn units(&self) -> usize {
        self.hidden().ncols()
    }

    pub(crate) fn check(
        &self,
        context: &'static str,
        rnn_type: RnnType,
        batch_size: usize,
        units: usize,
    ) -> PgnResult<()> {
        if self.rnn_type() != rnn_type {
            return Err(PgnError::shape_mismatch(
                context,
                format!("{} state", rnn_type),
                format!("{} state", self.rnn_type()),
            ));
        }
        for tensor in self.tensors() {
            if tensor.dim() != (batch_size, units) {
                return Err(PgnError::shape_mismatch(context, (batch_size, units), tensor.dim()));
            }
        }
        Ok(())
    }
}

/// Checks that a cell's packed projections hold `gates` blocks of `units`.
///
/// `input_proj` must be `[gates * units, input_dim]` and `recurrent_proj`
/// `[gates * units, units]`; biases, when present, match the packed width.
pub(crate) fn check_gate_projections(
    context: &'static str,
    input_proj: &LinearLayer,
    recurrent_proj: &LinearLayer,
    gates: usize,
    units: usize,
) -> PgnResult<()> {
    let packed = gates * units;
    if input_proj.out_features() != packed {
        return Err(PgnError::shape_mismatch(context, packed, input_proj.out_features()));
    }
    if recurrent_proj.shape() != [packed, units] {
        return Err(PgnError::shape_mismatch(context, [packed, units], recurrent_proj.shape()));
    }
    for bias in [&input_proj.bias, &recurrent_proj.bias].into_iter().flatten() {
        if bias.len() != packed {
            return Err(PgnError::shape_mismatch(context, packed, bias.len()));
        }
    }
    Ok(())
}

/// One recurrent cell with its parameters.
#[derive(Debug, Clone)]
pub enum RnnCell {
    Gru(GruCell),
    Lstm(LstmCell),
}

impl RnnCell {
    pub fn new<R: Rng + ?Sized>(
        rnn_type: RnnType,
        input_dim: usize,
        units: usize,
        rng: &mut R,
    ) -> Self {
        match rnn_type {
            RnnType::Gru => RnnCell::Gru(GruCell::new(input_dim, units, rng)),
            RnnType::Lstm => RnnCell::Lstm(LstmCell::new(input_dim, units, rng)),
        }
    }

    pub fn rnn_type(&self) -> RnnType {
        match self {
            RnnCell::Gru(_) => RnnType::Gru,
            RnnCell::Lstm(_) => RnnType::Lstm,
        }
    }

    pub fn units(&self) -> usize {
        match self {
            RnnCell::Gru(cell) => cell.units(),
            RnnCell::Lstm(cell) => cell.units(),
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            RnnCell::Gru(cell) => cell.input_dim(),
            RnnCell::Lstm(cell) => cell.input_dim(),
        }
    }

    pub fn zero_state(&self, batch_size: usize) -> RecurrentState {
        RecurrentState::zeros(self.rnn_type(), batch_size, self.units())
    }

    /// Advances the state by one timestep. `x` is `[batch, input_dim]`.
    pub fn step(&self, x: &ArrayView2<f32>, state: &RecurrentState) -> PgnResult<RecurrentState> {
        if x.ncols() != self.input_dim() {
            return Err(PgnError::shape_mismatch("RnnCell::step input", self.input_dim(), x.ncols()));
        }
        state.check("RnnCell::step state", self.rnn_type(), x.nrows(), self.units())?;
        match self {
            RnnCell::Gru(cell) => cell.validate()?,
            RnnCell::Lstm(cell) => cell.validate()?,
        }

        match (self, state) {
            (RnnCell::Gru(cell), RecurrentState::Gru(h)) => Ok(RecurrentState::Gru(cell.step(x, h))),
            (RnnCell::Lstm(cell), RecurrentState::Lstm { h, c }) => {
                let (h, c) = cell.step(x, h, c);
                Ok(RecurrentState::Lstm { h, c })
            }
            (cell, state) => Err(PgnError::shape_mismatch(
                "RnnCell::step state",
                cell.rnn_type(),
                state.rnn_type(),
            )),
        }
    }

    /// Runs the cell across `[batch, seq_len, input_dim]`.
    ///
    /// With `reverse` the sequence is consumed from the last position to the
    /// first; the returned outputs are still indexed by original position, so
    /// `outputs[:, t]` is the hidden state right after reading `inputs[:, t]`.
    pub fn forward_sequence(
        &self,
        inputs: &Array3<f32>,
        initial: &RecurrentState,
        reverse: bool,
    ) -> PgnResult<(Array3<f32>, RecurrentState)> {
        let (batch_size, seq_len, _) = inputs.dim();
        let mut outputs = Array3::<f32>::zeros((batch_size, seq_len, self.units()));
        let mut state = initial.clone();

        let positions: Vec<usize> = if reverse {
            (0..seq_len).rev().collect()
        } else {
            (0..seq_len).collect()
        };

        if positions.is_empty() {
            state.check("RnnCell::forward_sequence state", self.rnn_type(), batch_size, self.units())?;
        }

        for t in positions {
            let x_t = inputs.index_axis(Axis(1), t);
            state = self.step(&x_t, &state)?;
            outputs.index_axis_mut(Axis(1), t).assign(state.hidden());
        }

        Ok((outputs, state))
    }
}
