//! Recurrent sequence encoder.
//!
//! Embeds source token ids and runs a GRU or LSTM cell over them. In the
//! bidirectional case a second, independent cell reads the sequence back to
//! front; its outputs are realigned to source positions and concatenated after
//! the forward outputs, so every position carries `[fwd, bwd]`.

use ndarray::{concatenate, Array2, Array3, Axis};
use ndarray_rand::rand::Rng;

use crate::config::EncoderConfig;
use crate::embeddings::Embeddings;
use crate::error::{PgnError, PgnResult};
use crate::rnn::{RecurrentState, RnnCell, RnnType};


/// Recurrent state of the whole encoder, one entry per direction.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderState {
    pub forward: RecurrentState,
    pub backward: Option<RecurrentState>,
}

impl EncoderState {
    pub fn num_tensors(&self) -> usize {
        self.tensors().len()
    }

    /// Flattened view: forward `h` (and `c`), then backward `h` (and `c`).
    pub fn tensors(&self) -> Vec<&Array2<f32>> {
        let mut out = self.forward.tensors();
        if let Some(backward) = &self.backward {
            out.extend(backward.tensors());
        }
        out
    }
}

pub struct Encoder {
    embeddings: Embeddings,
    forward: RnnCell,
    backward: Option<RnnCell>,
    config: EncoderConfig,
}

impl Encoder {
    pub fn new<R: Rng + ?Sized>(
        config: &EncoderConfig,
        embeddings: Embeddings,
        rng: &mut R,
    ) -> PgnResult<Self> {
        config.validate()?;
        let table_shape = (embeddings.vocab_size(), embeddings.embedding_dim());
        if table_shape != (config.vocab_size, config.embedding_dim) {
            return Err(PgnError::shape_mismatch(
                "encoder embedding table",
                (config.vocab_size, config.embedding_dim),
                table_shape,
            ));
        }

        let forward = RnnCell::new(config.rnn_type, config.embedding_dim, config.units, rng);
        let backward = config
            .bidirectional
            .then(|| RnnCell::new(config.rnn_type, config.embedding_dim, config.units, rng));

        log::debug!(
            "Encoder: rnn={} vocab={} units={} bidirectional={} output_dim={}",
            config.rnn_type,
            config.vocab_size,
            config.units,
            config.bidirectional,
            config.output_dim()
        );

        Ok(Self {
            embeddings,
            forward,
            backward,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn rnn_type(&self) -> RnnType {
        self.config.rnn_type
    }

    pub fn is_bidirectional(&self) -> bool {
        self.backward.is_some()
    }

    /// Width of each output vector (`2 * units` when bidirectional).
    pub fn output_dim(&self) -> usize {
        self.config.output_dim()
    }

    pub fn embeddings(&self) -> &Embeddings {
        &self.embeddings
    }

    /// All-zero state for `batch_size` rows, or the configured batch size.
    pub fn initialize_hidden_state(&self, batch_size: Option<usize>) -> EncoderState {
        let batch_size = batch_size.unwrap_or(self.config.batch_size);
        EncoderState {
            forward: self.forward.zero_state(batch_size),
            backward: self.backward.as_ref().map(|cell| cell.zero_state(batch_size)),
        }
    }

    /// Encodes `[batch, seq_len]` token ids.
    ///
    /// Returns the per-position outputs `[batch, seq_len, output_dim]` and the
    /// final state of each direction.
    pub fn encode(
        &self,
        input_ids: &Array2<u32>,
        initial: &EncoderState,
    ) -> PgnResult<(Array3<f32>, EncoderState)> {
        let embedded = self.embeddings.forward(input_ids)?;
        let (fwd_out, fwd_state) = self.forward.forward_sequence(&embedded, &initial.forward, false)?;

        match (&self.backward, &initial.backward) {
            (None, None) => Ok((
                fwd_out,
                EncoderState {
                    forward: fwd_state,
                    backward: None,
                },
            )),
            (Some(cell), Some(bwd_initial)) => {
                let (bwd_out, bwd_state) = cell.forward_sequence(&embedded, bwd_initial, true)?;
                let outputs = concatenate(Axis(2), &[fwd_out.view(), bwd_out.view()])?;
                Ok((
                    outputs,
                    EncoderState {
                        forward: fwd_state,
                        backward: Some(bwd_state),
                    },
                ))
            }
            _ => Err(PgnError::shape_mismatch(
                "encoder initial state tensors",
                self.config.state_tensors(),
                initial.num_tensors(),
            )),
        }
    }
}
