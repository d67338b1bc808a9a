//! Model configuration.
//!
//! `Seq2SeqConfig` is the user-facing surface (usually read from JSON); the
//! per-layer configs are derived from it so that the encoder output width,
//! decoder width and attention width always agree.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attention::ScoreType;
use crate::error::{PgnError, PgnResult};
use crate::rnn::RnnType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub units: usize,
    pub batch_size: usize,
    #[serde(default)]
    pub rnn_type: RnnType,
    #[serde(default)]
    pub bidirectional: bool,
}

impl EncoderConfig {
    /// Width of each encoder output vector.
    pub fn output_dim(&self) -> usize {
        if self.bidirectional {
            2 * self.units
        } else {
            self.units
        }
    }

    /// Number of tensors in a full encoder state.
    pub fn state_tensors(&self) -> usize {
        let per_direction = self.rnn_type.state_tensors();
        if self.bidirectional {
            2 * per_direction
        } else {
            per_direction
        }
    }

    pub fn validate(&self) -> PgnResult<()> {
        require_positive("encoder vocab_size", self.vocab_size)?;
        require_positive("encoder embedding_dim", self.embedding_dim)?;
        require_positive("encoder units", self.units)?;
        require_positive("encoder batch_size", self.batch_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub units: usize,
    pub batch_size: usize,
    #[serde(default)]
    pub rnn_type: RnnType,
    /// Width of the attention context vector fed to the output projection.
    pub context_dim: usize,
}

impl DecoderConfig {
    pub fn validate(&self) -> PgnResult<()> {
        require_positive("decoder vocab_size", self.vocab_size)?;
        require_positive("decoder embedding_dim", self.embedding_dim)?;
        require_positive("decoder units", self.units)?;
        require_positive("decoder batch_size", self.batch_size)?;
        require_positive("decoder context_dim", self.context_dim)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Hidden width of the additive-concat scorer. Ignored by the others.
    #[serde(default)]
    pub units: usize,
    #[serde(default)]
    pub score_type: ScoreType,
    #[serde(default)]
    pub use_coverage: bool,
    /// Accepted for compatibility; scoring never reads it.
    #[serde(default)]
    pub mask_index: Option<u32>,
}

fn default_batch_size() -> usize {
    1
}

/// Top-level configuration for the whole pointer-generator stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seq2SeqConfig {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub encoder_units: usize,
    /// Derived from `score_type` when absent.
    #[serde(default)]
    pub decoder_units: Option<usize>,
    /// Derived from `score_type` when absent.
    #[serde(default)]
    pub attention_units: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub rnn_type: RnnType,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub score_type: ScoreType,
    #[serde(default)]
    pub use_coverage: bool,
    #[serde(default)]
    pub mask_index: Option<u32>,
    /// Seed for parameter initialisation.
    #[serde(default)]
    pub seed: u64,
}

impl Seq2SeqConfig {
    pub fn new(vocab_size: usize, embedding_dim: usize, encoder_units: usize, batch_size: usize) -> Self {
        Self {
            vocab_size,
            embedding_dim,
            encoder_units,
            decoder_units: None,
            attention_units: None,
            batch_size,
            rnn_type: RnnType::default(),
            bidirectional: false,
            score_type: ScoreType::default(),
            use_coverage: false,
            mask_index: None,
            seed: 0,
        }
    }

    pub fn from_json_str(json: &str) -> PgnResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> PgnResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn with_rnn_type(mut self, rnn_type: RnnType) -> Self {
        self.rnn_type = rnn_type;
        self
    }

    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    pub fn with_score_type(mut self, score_type: ScoreType) -> Self {
        self.score_type = score_type;
        self
    }

    pub fn with_coverage(mut self, use_coverage: bool) -> Self {
        self.use_coverage = use_coverage;
        self
    }

    pub fn with_mask_index(mut self, mask_index: Option<u32>) -> Self {
        self.mask_index = mask_index;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_decoder_units(mut self, units: usize) -> Self {
        self.decoder_units = Some(units);
        self
    }

    pub fn with_attention_units(mut self, units: usize) -> Self {
        self.attention_units = Some(units);
        self
    }

    pub fn encoder_output_dim(&self) -> usize {
        self.encoder_config().output_dim()
    }

    /// Decoder width: the explicit value, or what the score type needs.
    ///
    /// Dot-product and cosine scoring compare decoder state and encoder output
    /// directly, so the decoder must be as wide as the encoder output. The
    /// other two project and can keep the encoder's unit count.
    pub fn decoder_units(&self) -> usize {
        self.decoder_units.unwrap_or(match self.score_type {
            ScoreType::AdditiveConcat | ScoreType::General => self.encoder_units,
            ScoreType::DotProduct | ScoreType::CosineSimilarity => self.encoder_output_dim(),
        })
    }

    pub fn attention_units(&self) -> usize {
        self.attention_units.unwrap_or(match self.score_type {
            ScoreType::AdditiveConcat => self.encoder_units,
            ScoreType::General => self.encoder_output_dim(),
            ScoreType::DotProduct | ScoreType::CosineSimilarity => 0,
        })
    }

    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            vocab_size: self.vocab_size,
            embedding_dim: self.embedding_dim,
            units: self.encoder_units,
            batch_size: self.batch_size,
            rnn_type: self.rnn_type,
            bidirectional: self.bidirectional,
        }
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            vocab_size: self.vocab_size,
            embedding_dim: self.embedding_dim,
            units: self.decoder_units(),
            batch_size: self.batch_size,
            rnn_type: self.rnn_type,
            context_dim: self.encoder_output_dim(),
        }
    }

    pub fn attention_config(&self) -> AttentionConfig {
        AttentionConfig {
            units: self.attention_units(),
            score_type: self.score_type,
            use_coverage: self.use_coverage,
            mask_index: self.mask_index,
        }
    }

    /// Checks unit counts and the cross-layer dimension constraints.
    pub fn validate(&self) -> PgnResult<()> {
        self.encoder_config().validate()?;
        self.decoder_config().validate()?;

        let enc_dim = self.encoder_output_dim();
        match self.score_type {
            ScoreType::AdditiveConcat => {
                require_positive("attention_units for additive-concat", self.attention_units())?
            }
            ScoreType::General => {
                if self.attention_units() != enc_dim {
                    return Err(PgnError::shape_mismatch(
                        "general attention_units (must equal encoder output width)",
                        enc_dim,
                        self.attention_units(),
                    ));
                }
            }
            ScoreType::DotProduct | ScoreType::CosineSimilarity => {
                if self.decoder_units() != enc_dim {
                    return Err(PgnError::shape_mismatch(
                        "decoder_units (must equal encoder output width for this score type)",
                        enc_dim,
                        self.decoder_units(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn require_positive(name: &str, value: usize) -> PgnResult<()> {
    if value == 0 {
        return Err(PgnError::InvalidConfig(format!("{} must be greater than 0", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_units_follow_score_type() {
        let base = Seq2SeqConfig::new(20, 8, 10, 5).with_bidirectional(true);

        let additive = base.clone().with_score_type(ScoreType::AdditiveConcat);
        assert_eq!((additive.decoder_units(), additive.attention_units()), (10, 10));

        let general = base.clone().with_score_type(ScoreType::General);
        assert_eq!((general.decoder_units(), general.attention_units()), (10, 20));

        let cosine = base.clone().with_score_type(ScoreType::CosineSimilarity);
        assert_eq!((cosine.decoder_units(), cosine.attention_units()), (20, 0));

        let dot = base.with_bidirectional(false).with_score_type(ScoreType::DotProduct);
        assert_eq!((dot.decoder_units(), dot.attention_units()), (10, 0));
    }

    #[test]
    fn test_state_tensor_counts() {
        let cfg = Seq2SeqConfig::new(20, 8, 10, 5);
        assert_eq!(cfg.clone().encoder_config().state_tensors(), 1);
        assert_eq!(
            cfg.clone()
                .with_rnn_type(RnnType::Lstm)
                .with_bidirectional(true)
                .encoder_config()
                .state_tensors(),
            4
        );
        assert_eq!(cfg.with_bidirectional(true).encoder_config().state_tensors(), 2);
    }

    #[test]
    fn test_from_json_with_defaults() {
        let json = r#"{
            "vocab_size": 20,
            "embedding_dim": 8,
            "encoder_units": 10,
            "batch_size": 5,
            "rnn_type": "lstm",
            "bidirectional": true,
            "score_type": "cosine-similarity"
        }"#;
        let cfg = Seq2SeqConfig::from_json_str(json).unwrap();

        assert_eq!(cfg.rnn_type, RnnType::Lstm);
        assert_eq!(cfg.score_type, ScoreType::CosineSimilarity);
        assert!(!cfg.use_coverage);
        assert_eq!(cfg.mask_index, None);
        assert_eq!(cfg.decoder_config().context_dim, 20);
    }

    #[test]
    fn test_unknown_rnn_type_in_json_is_config_error() {
        let json = r#"{"vocab_size": 20, "embedding_dim": 8, "encoder_units": 10, "rnn_type": "rnn"}"#;
        let err = Seq2SeqConfig::from_json_str(json).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("rnn"));
    }

    #[test]
    fn test_unknown_score_type_in_json_is_config_error() {
        let json = r#"{"vocab_size": 20, "embedding_dim": 8, "encoder_units": 10, "score_type": "bilinear"}"#;
        let err = Seq2SeqConfig::from_json_str(json).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_units_rejected() {
        let err = Seq2SeqConfig::new(20, 8, 0, 5).validate().unwrap_err();
        assert!(matches!(err, PgnError::InvalidConfig(_)));
    }

    #[test]
    fn test_dot_product_requires_matching_widths() {
        let cfg = Seq2SeqConfig::new(20, 8, 10, 5)
            .with_bidirectional(true)
            .with_score_type(ScoreType::DotProduct)
            .with_decoder_units(10);
        assert!(matches!(cfg.validate(), Err(PgnError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_general_requires_projection_to_encoder_width() {
        let cfg = Seq2SeqConfig::new(20, 8, 10, 5)
            .with_score_type(ScoreType::General)
            .with_attention_units(7);
        assert!(matches!(cfg.validate(), Err(PgnError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let err = Seq2SeqConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PgnError::Io(_)));
    }
}
