//! Single-step recurrent decoder with a softmax output head.

use ndarray::{concatenate, Array1, Array2, Axis};
use ndarray_rand::rand::Rng;

use crate::activations::softmax_rows_inplace;
use crate::config::DecoderConfig;
use crate::embeddings::Embeddings;
use crate::error::{PgnError, PgnResult};
use crate::linear_layer::LinearLayer;
use crate::rnn::{RecurrentState, RnnCell};


/// Result of one decode step.
#[derive(Debug, Clone)]
pub struct DecoderOutput {
    /// `[batch, vocab_size]`, every row sums to 1.
    pub vocab_distribution: Array2<f32>,
    /// State after consuming the previous token.
    pub state: RecurrentState,
    /// Embedded previous token `[batch, embedding_dim]`, the `x` input of the
    /// pointer gate.
    pub decoder_input: Array2<f32>,
}

pub struct Decoder {
    embeddings: Embeddings,
    rnn: RnnCell,
    /// `[context, h]` → `2 * units`, no activation.
    pub dense1: LinearLayer,
    /// `2 * units` → vocabulary logits.
    pub dense2: LinearLayer,
    config: DecoderConfig,
}

impl Decoder {
    pub fn new<R: Rng + ?Sized>(
        config: &DecoderConfig,
        embeddings: Embeddings,
        rng: &mut R,
    ) -> PgnResult<Self> {
        config.validate()?;
        let table_shape = (embeddings.vocab_size(), embeddings.embedding_dim());
        if table_shape != (config.vocab_size, config.embedding_dim) {
            return Err(PgnError::shape_mismatch(
                "decoder embedding table",
                (config.vocab_size, config.embedding_dim),
                table_shape,
            ));
        }

        let rnn = RnnCell::new(config.rnn_type, config.embedding_dim, config.units, rng);
        let hidden = 2 * config.units;
        let dense1 = LinearLayer::glorot_uniform(hidden, config.context_dim + config.units, true, rng);
        let dense2 = LinearLayer::glorot_uniform(config.vocab_size, hidden, true, rng);

        log::debug!(
            "Decoder: rnn={} units={} context_dim={} vocab={}",
            config.rnn_type,
            config.units,
            config.context_dim,
            config.vocab_size
        );

        Ok(Self {
            embeddings,
            rnn,
            dense1,
            dense2,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn units(&self) -> usize {
        self.config.units
    }

    pub fn embeddings(&self) -> &Embeddings {
        &self.embeddings
    }

    pub fn initialize_hidden_state(&self, batch_size: Option<usize>) -> RecurrentState {
        self.rnn.zero_state(batch_size.unwrap_or(self.config.batch_size))
    }

    /// Consumes `prev_tokens` (`[batch]`) and produces the next-token
    /// distribution.
    ///
    /// `context` is the attention context for this step, `[batch, context_dim]`.
    pub fn decode_step(
        &self,
        prev_tokens: &Array1<u32>,
        prev_state: &RecurrentState,
        context: &Array2<f32>,
    ) -> PgnResult<DecoderOutput> {
        let batch_size = prev_tokens.len();
        if context.dim() != (batch_size, self.config.context_dim) {
            return Err(PgnError::shape_mismatch(
                "decoder context vector",
                (batch_size, self.config.context_dim),
                context.dim(),
            ));
        }

        let decoder_input = self.embeddings.lookup(&prev_tokens.view())?;
        let state = self.rnn.step(&decoder_input.view(), prev_state)?;

        let features = concatenate(Axis(1), &[context.view(), state.hidden().view()])?;
        let hidden = self.dense1.forward(&features.view())?;
        let mut vocab_distribution = self.dense2.forward(&hidden.view())?;
        softmax_rows_inplace(&mut vocab_distribution);

        Ok(DecoderOutput {
            vocab_distribution,
            state,
            decoder_input,
        })
    }
}
