//! Encoder-decoder attention with optional coverage.
//!
//! Each decode step scores every encoder position against the current decoder
//! state, turns the scores into a distribution over the unpadded positions and
//! summarises the encoder outputs into a context vector. With coverage enabled
//! the running sum of past attention feeds back into the additive score.

mod score;

use std::fmt;
use std::str::FromStr;

use crate::activations::masked_softmax_inplace;
use crate::config::AttentionConfig;
use crate::error::{PgnError, PgnResult};
use crate::linear_layer::LinearLayer;
use ndarray::{Array2, Array3, Axis, Zip};
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};

pub use score::ScoreFunction;


/// Names of the supported score functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScoreType {
    #[default]
    AdditiveConcat,
    DotProduct,
    General,
    CosineSimilarity,
}

impl ScoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::AdditiveConcat => "additive-concat",
            ScoreType::DotProduct => "dot-product",
            ScoreType::General => "general",
            ScoreType::CosineSimilarity => "cosine-similarity",
        }
    }
}

impl FromStr for ScoreType {
    type Err = PgnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "additive-concat" => Ok(ScoreType::AdditiveConcat),
            "dot-product" => Ok(ScoreType::DotProduct),
            "general" => Ok(ScoreType::General),
            "cosine-similarity" => Ok(ScoreType::CosineSimilarity),
            _ => Err(PgnError::UnsupportedScoreType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ScoreType {
    type Error = PgnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScoreType> for String {
    fn from(value: ScoreType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coverage threaded through the decode loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    /// Coverage is off: nothing is read or produced.
    Disabled,
    /// Coverage is on. `None` before the first step, then `[batch, seq_len]`.
    Enabled(Option<Array2<f32>>),
}

impl Coverage {
    /// The value to start a decode loop with.
    pub fn initial(use_coverage: bool) -> Self {
        if use_coverage {
            Coverage::Enabled(None)
        } else {
            Coverage::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Coverage::Enabled(_))
    }

    pub fn vector(&self) -> Option<&Array2<f32>> {
        match self {
            Coverage::Enabled(Some(c)) => Some(c),
            _ => None,
        }
    }
}

/// Result of one attention step.
#[derive(Debug, Clone)]
pub struct AttentionOutput {
    /// `[batch, encoder_dim]`
    pub context: Array2<f32>,
    /// `[batch, seq_len]`, zero on padded positions.
    pub weights: Array2<f32>,
    /// Updated coverage, to be passed to the next step.
    pub coverage: Coverage,
}

/// Attention layer: a score function plus the dimensions it was built for.
#[derive(Debug, Clone)]
pub struct Attention {
    pub score: ScoreFunction,
    encoder_dim: usize,
    decoder_dim: usize,
    use_coverage: bool,
}

impl Attention {
    /// Builds the scorer for `encoder_dim`-wide encoder outputs and
    /// `decoder_dim`-wide decoder states, failing early on incompatible widths.
    pub fn new<R: Rng + ?Sized>(
        config: &AttentionConfig,
        encoder_dim: usize,
        decoder_dim: usize,
        rng: &mut R,
    ) -> PgnResult<Self> {
        if let Some(index) = config.mask_index {
            log::warn!("mask_index={} is set but attention scoring does not use it", index);
        }

        let score = match config.score_type {
            ScoreType::AdditiveConcat => {
                if config.units == 0 {
                    return Err(PgnError::InvalidConfig(
                        "additive-concat attention needs units > 0".to_string(),
                    ));
                }
                ScoreFunction::AdditiveConcat {
                    w1: LinearLayer::glorot_uniform(config.units, encoder_dim, true, rng),
                    w2: LinearLayer::glorot_uniform(config.units, decoder_dim, true, rng),
                    w3: LinearLayer::glorot_uniform(config.units, 1, true, rng),
                    va: LinearLayer::glorot_uniform(1, config.units, true, rng),
                }
            }
            ScoreType::General => {
                if config.units != 0 && config.units != encoder_dim {
                    return Err(PgnError::shape_mismatch(
                        "general attention units",
                        encoder_dim,
                        config.units,
                    ));
                }
                ScoreFunction::General {
                    w1: LinearLayer::glorot_uniform(encoder_dim, decoder_dim, true, rng),
                }
            }
            ScoreType::DotProduct => ScoreFunction::DotProduct,
            ScoreType::CosineSimilarity => ScoreFunction::CosineSimilarity,
        };

        Self::from_score(score, encoder_dim, decoder_dim, config.use_coverage)
    }

    /// Wraps an already-built score function, validating its dimensions.
    pub fn from_score(
        score: ScoreFunction,
        encoder_dim: usize,
        decoder_dim: usize,
        use_coverage: bool,
    ) -> PgnResult<Self> {
        score.validate(encoder_dim, decoder_dim)?;
        log::debug!(
            "Attention({}) encoder_dim={} decoder_dim={} coverage={}",
            score.score_type(),
            encoder_dim,
            decoder_dim,
            use_coverage
        );
        Ok(Self {
            score,
            encoder_dim,
            decoder_dim,
            use_coverage,
        })
    }

    pub fn score_type(&self) -> ScoreType {
        self.score.score_type()
    }

    pub fn encoder_dim(&self) -> usize {
        self.encoder_dim
    }

    pub fn decoder_dim(&self) -> usize {
        self.decoder_dim
    }

    /// Whether this layer was configured to thread coverage.
    pub fn use_coverage(&self) -> bool {
        self.use_coverage
    }

    /// Coverage value a decode loop should start with.
    pub fn initial_coverage(&self) -> Coverage {
        Coverage::initial(self.use_coverage)
    }

    /// Masked attention distribution over encoder positions: `[batch, seq_len]`.
    ///
    /// Raw scores are multiplied by the mask, then the softmax runs over the
    /// unmasked positions only, so padded positions get exactly zero weight.
    pub fn attention_weights(
        &self,
        encoder_outputs: &Array3<f32>,
        decoder_hidden: &Array2<f32>,
        pad_mask: &Array2<f32>,
        prev_coverage: Option<&Array2<f32>>,
    ) -> PgnResult<Array2<f32>> {
        self.check_inputs(encoder_outputs, decoder_hidden, pad_mask, prev_coverage)?;

        let mut scores = self.score.raw_scores(encoder_outputs, decoder_hidden, prev_coverage)?;
        scores *= pad_mask;

        Zip::from(scores.rows_mut())
            .and(pad_mask.rows())
            .for_each(|mut row, mask| masked_softmax_inplace(&mut row, &mask));

        Ok(scores)
    }

    /// One attention step: context vector, weights and updated coverage.
    pub fn forward(
        &self,
        encoder_outputs: &Array3<f32>,
        decoder_hidden: &Array2<f32>,
        pad_mask: &Array2<f32>,
        coverage: &Coverage,
    ) -> PgnResult<AttentionOutput> {
        let weights = self.attention_weights(
            encoder_outputs,
            decoder_hidden,
            pad_mask,
            coverage.vector(),
        )?;

        let coverage = match coverage {
            Coverage::Disabled => Coverage::Disabled,
            Coverage::Enabled(None) => Coverage::Enabled(Some(weights.clone())),
            Coverage::Enabled(Some(prev)) => Coverage::Enabled(Some(prev + &weights)),
        };

        let context = context_vector(&weights, encoder_outputs)?;

        Ok(AttentionOutput {
            context,
            weights,
            coverage,
        })
    }

    fn check_inputs(
        &self,
        encoder_outputs: &Array3<f32>,
        decoder_hidden: &Array2<f32>,
        pad_mask: &Array2<f32>,
        prev_coverage: Option<&Array2<f32>>,
    ) -> PgnResult<()> {
        let (batch_size, seq_len, enc_dim) = encoder_outputs.dim();
        if enc_dim != self.encoder_dim {
            return Err(PgnError::shape_mismatch("attention encoder width", self.encoder_dim, enc_dim));
        }
        if decoder_hidden.dim() != (batch_size, self.decoder_dim) {
            return Err(PgnError::shape_mismatch(
                "attention decoder hidden",
                (batch_size, self.decoder_dim),
                decoder_hidden.dim(),
            ));
        }
        if pad_mask.dim() != (batch_size, seq_len) {
            return Err(PgnError::shape_mismatch(
                "attention padding mask",
                (batch_size, seq_len),
                pad_mask.dim(),
            ));
        }
        if let Some(cov) = prev_coverage {
            if cov.dim() != (batch_size, seq_len) {
                return Err(PgnError::shape_mismatch(
                    "attention coverage",
                    (batch_size, seq_len),
                    cov.dim(),
                ));
            }
        }
        Ok(())
    }
}

/// `Σ_t weights[b, t] · encoder_outputs[b, t, :]` for every batch row.
pub fn context_vector(weights: &Array2<f32>, encoder_outputs: &Array3<f32>) -> PgnResult<Array2<f32>> {
    let (batch_size, seq_len, enc_dim) = encoder_outputs.dim();
    if weights.dim() != (batch_size, seq_len) {
        return Err(PgnError::shape_mismatch(
            "context_vector weights",
            (batch_size, seq_len),
            weights.dim(),
        ));
    }

    let mut context = Array2::<f32>::zeros((batch_size, enc_dim));
    for (b, mut ctx) in context.outer_iter_mut().enumerate() {
        ctx.assign(&weights.row(b).dot(&encoder_outputs.index_axis(Axis(0), b)));
    }

    Ok(context)
}
