//! Wires encoder, attention, decoder and pointer gate into a greedy decode loop.

use std::time::Instant;

use ndarray::{Array1, Array2, Array3};

use crate::activations::argmax_rows;
use crate::attention::{Attention, Coverage};
use crate::config::Seq2SeqConfig;
use crate::decoder::Decoder;
use crate::embeddings::{EmbeddingProvider, Embeddings};
use crate::encoder::{Encoder, EncoderState};
use crate::error::{PgnError, PgnResult};
use crate::linear_layer::{seeded_rng, ParamRng};
use crate::pointer::Pointer;
use crate::rnn::RecurrentState;

/// Everything one decode step produces.
#[derive(Debug, Clone)]
pub struct DecodeStep {
    /// `[batch, vocab_size]`
    pub vocab_distribution: Array2<f32>,
    /// `[batch, encoder_output_dim]`
    pub context: Array2<f32>,
    /// `[batch, seq_len]`
    pub attention: Array2<f32>,
    pub coverage: Coverage,
    /// `[batch]`, strictly inside (0, 1).
    pub p_gen: Array1<f32>,
    pub state: RecurrentState,
}

pub struct PointerGenerator {
    config: Seq2SeqConfig,
    encoder: Encoder,
    attention: Attention,
    decoder: Decoder,
    pointer: Pointer,
}

impl PointerGenerator {
    /// Builds the model with freshly initialised, trainable embedding tables
    /// (one for the encoder and one for the decoder).
    pub fn new(config: Seq2SeqConfig) -> PgnResult<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let encoder_embeddings = Embeddings::trainable(config.vocab_size, config.embedding_dim, &mut rng);
        let decoder_embeddings = Embeddings::trainable(config.vocab_size, config.embedding_dim, &mut rng);
        Self::build(config, encoder_embeddings, decoder_embeddings, &mut rng)
    }

    /// Builds the model around one embedding table shared by encoder and decoder.
    pub fn with_embeddings(config: Seq2SeqConfig, embeddings: Embeddings) -> PgnResult<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        Self::build(config, embeddings.clone(), embeddings, &mut rng)
    }

    /// Loads a frozen pretrained table through `provider` and shares it.
    pub fn from_provider(config: Seq2SeqConfig, provider: &dyn EmbeddingProvider) -> PgnResult<Self> {
        let embeddings = Embeddings::from_provider(provider)?;
        Self::with_embeddings(config, embeddings)
    }

    fn build(
        config: Seq2SeqConfig,
        encoder_embeddings: Embeddings,
        decoder_embeddings: Embeddings,
        rng: &mut ParamRng,
    ) -> PgnResult<Self> {
        let encoder = Encoder::new(&config.encoder_config(), encoder_embeddings, rng)?;
        let attention = Attention::new(
            &config.attention_config(),
            config.encoder_output_dim(),
            config.decoder_units(),
            rng,
        )?;
        let decoder = Decoder::new(&config.decoder_config(), decoder_embeddings, rng)?;
        let pointer = Pointer::new(
            config.encoder_output_dim(),
            config.decoder_units(),
            config.embedding_dim,
            rng,
        );

        log::info!(
            "PointerGenerator ready: rnn={} bidirectional={} score={} coverage={} enc_dim={} dec_units={}",
            config.rnn_type,
            config.bidirectional,
            config.score_type,
            config.use_coverage,
            config.encoder_output_dim(),
            config.decoder_units()
        );

        Ok(Self {
            config,
            encoder,
            attention,
            decoder,
            pointer,
        })
    }

    pub fn config(&self) -> &Seq2SeqConfig {
        &self.config
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn attention(&self) -> &Attention {
        &self.attention
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// Encodes `[batch, seq_len]` ids from an all-zero initial state.
    pub fn encode(&self, input_ids: &Array2<u32>) -> PgnResult<(Array3<f32>, EncoderState)> {
        let initial = self.encoder.initialize_hidden_state(Some(input_ids.nrows()));
        self.encoder.encode(input_ids, &initial)
    }

    /// One decode step.
    ///
    /// Attention reads the hidden part of `state` (the state before consuming
    /// `prev_tokens`); the decoder then consumes `prev_tokens` with the
    /// resulting context. p_gen sees the same hidden state as attention.
    pub fn step(
        &self,
        encoder_outputs: &Array3<f32>,
        pad_mask: &Array2<f32>,
        prev_tokens: &Array1<u32>,
        state: &RecurrentState,
        coverage: &Coverage,
    ) -> PgnResult<DecodeStep> {
        let attended = self
            .attention
            .forward(encoder_outputs, state.hidden(), pad_mask, coverage)?;
        let decoded = self
            .decoder
            .decode_step(prev_tokens, state, &attended.context)?;
        let p_gen = self
            .pointer
            .p_gen(&attended.context, state.hidden(), &decoded.decoder_input)?;

        Ok(DecodeStep {
            vocab_distribution: decoded.vocab_distribution,
            context: attended.context,
            attention: attended.weights,
            coverage: attended.coverage,
            p_gen,
            state: decoded.state,
        })
    }

    /// Runs `steps` greedy steps, feeding each argmax back as the next input.
    ///
    /// Returns predictions `[steps, batch]`. Without `pad_mask` every source
    /// position is attended.
    pub fn greedy_decode(
        &self,
        input_ids: &Array2<u32>,
        pad_mask: Option<&Array2<f32>>,
        start_tokens: &Array1<u32>,
        steps: usize,
    ) -> PgnResult<Array2<u32>> {
        let start = Instant::now();
        let batch_size = input_ids.nrows();
        if start_tokens.len() != batch_size {
            return Err(PgnError::shape_mismatch(
                "greedy_decode start tokens",
                batch_size,
                start_tokens.len(),
            ));
        }

        let (encoder_outputs, _) = self.encode(input_ids)?;
        let default_mask;
        let pad_mask = match pad_mask {
            Some(mask) => mask,
            None => {
                default_mask = Array2::<f32>::ones(input_ids.dim());
                &default_mask
            }
        };

        let mut state = self.decoder.initialize_hidden_state(Some(batch_size));
        let mut coverage = self.attention.initial_coverage();
        let mut tokens = start_tokens.clone();
        let mut predictions = Array2::<u32>::zeros((steps, batch_size));

        for (t, mut row) in predictions.outer_iter_mut().enumerate() {
            let out = self.step(&encoder_outputs, pad_mask, &tokens, &state, &coverage)?;
            tokens = argmax_rows(&out.vocab_distribution);
            row.assign(&tokens);
            log::debug!("step {}: mean p_gen {:.4}", t, out.p_gen.mean().unwrap_or(0.0));
            state = out.state;
            coverage = out.coverage;
        }

        log::info!(
            "Greedy decode: batch={} source_len={} steps={} in {:.2}ms",
            batch_size,
            input_ids.ncols(),
            steps,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(predictions)
    }
}
