//! Error types for the pointer-generator layers.

use std::fmt::Debug;

use thiserror::Error;

/// Errors raised while configuring or running the layers.
#[derive(Debug, Error)]
pub enum PgnError {
    /// Recurrent cell name outside the supported set.
    #[error("Unsupported rnn_type '{0}': only gru and lstm are supported")]
    UnsupportedRnnType(String),

    /// Attention score name outside the supported set.
    #[error(
        "Unsupported score_type '{0}': expected additive-concat, dot-product, general or cosine-similarity"
    )]
    UnsupportedScoreType(String),

    /// Two tensors (or a tensor and a configured dimension) disagree.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// Configuration values that can never produce a working model.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external embedding provider failed to hand over a table.
    #[error("Embedding provider failed: {0}")]
    Provider(#[source] anyhow::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for layer operations.
pub type PgnResult<T> = Result<T, PgnError>;

impl PgnError {
    pub fn shape_mismatch(
        context: &'static str,
        expected: impl Debug,
        actual: impl Debug,
    ) -> Self {
        PgnError::ShapeMismatch {
            context,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// True for errors caused by the configuration rather than by the data.
    ///
    /// Deserialization failures count: an unknown `rnn_type` inside a JSON
    /// config surfaces as a serde data error.
    pub fn is_config_error(&self) -> bool {
        match self {
            PgnError::UnsupportedRnnType(_)
            | PgnError::UnsupportedScoreType(_)
            | PgnError::InvalidConfig(_) => true,
            PgnError::Json(e) => e.is_data(),
            _ => false,
        }
    }
}
