//! The seam to the external embedding-matrix collaborator.
//!
//! Building the table (vocabulary construction, word-vector training,
//! preprocessing) happens elsewhere; this crate only asks for the finished
//! `[vocab, embedding_dim]` matrix.

use anyhow::Result;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use serde::{Deserialize, Serialize};

use crate::linear_layer::seeded_rng;

/// Describes a table returned by an [`EmbeddingProvider`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    #[serde(default)]
    pub source: Option<String>,
}

/// Supplies a pretrained, vocabulary-indexed embedding matrix.
pub trait EmbeddingProvider {
    fn load(&self) -> Result<(Array2<f32>, EmbeddingMetadata)>;
}

/// A provider over a table that is already in memory.
#[derive(Debug, Clone)]
pub struct InMemoryEmbeddings {
    table: Array2<f32>,
    source: String,
}

impl InMemoryEmbeddings {
    pub fn new(table: Array2<f32>, source: impl Into<String>) -> Self {
        Self {
            table,
            source: source.into(),
        }
    }

    /// A seeded random table, handy for smoke runs without real vectors.
    pub fn random(vocab_size: usize, embedding_dim: usize, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let table = Array2::random_using(
            (vocab_size, embedding_dim),
            Uniform::new_inclusive(-1.0f32, 1.0),
            &mut rng,
        );
        Self::new(table, format!("random(seed={})", seed))
    }
}

impl EmbeddingProvider for InMemoryEmbeddings {
    fn load(&self) -> Result<(Array2<f32>, EmbeddingMetadata)> {
        let metadata = EmbeddingMetadata {
            vocab_size: self.table.nrows(),
            embedding_dim: self.table.ncols(),
            source: Some(self.source.clone()),
        };
        Ok((self.table.clone(), metadata))
    }
}
