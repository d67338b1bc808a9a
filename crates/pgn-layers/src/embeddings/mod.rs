mod loader;

use std::sync::Arc;

use crate::error::{PgnError, PgnResult};
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rayon::prelude::*;

pub use loader::{EmbeddingMetadata, EmbeddingProvider, InMemoryEmbeddings};


/// Range of the uniform initialiser for owned tables.
const TRAINABLE_INIT_RANGE: f32 = 0.05;

/// The word embedding table and who owns it.
#[derive(Debug, Clone)]
pub enum EmbeddingData {
    /// Pretrained table handed over by a provider. Shared and never mutated.
    Frozen(Arc<Array2<f32>>),
    /// Table owned by this layer; an external training step may update it.
    Trainable(Array2<f32>),
}

impl EmbeddingData {
    pub fn table(&self) -> ArrayView2<'_, f32> {
        match self {
            EmbeddingData::Frozen(arc) => arc.view(),
            EmbeddingData::Trainable(arr) => arr.view(),
        }
    }

    pub fn is_trainable(&self) -> bool {
        matches!(self, EmbeddingData::Trainable(_))
    }
}

/// A CPU embedding lookup over a `[vocab, embedding_dim]` table.
#[derive(Debug, Clone)]
pub struct Embeddings {
    pub word_embeddings: EmbeddingData,
}

impl Embeddings {
    pub fn new(word_embeddings: EmbeddingData) -> Self {
        Self { word_embeddings }
    }

    /// Wraps a shared pretrained table as a non-trainable embedding.
    pub fn frozen(table: Arc<Array2<f32>>) -> Self {
        Self::new(EmbeddingData::Frozen(table))
    }

    /// An owned table drawn uniformly from `[-0.05, 0.05]`.
    pub fn trainable<R: Rng + ?Sized>(vocab_size: usize, embedding_dim: usize, rng: &mut R) -> Self {
        let table = Array2::random_using(
            (vocab_size, embedding_dim),
            Uniform::new_inclusive(-TRAINABLE_INIT_RANGE, TRAINABLE_INIT_RANGE),
            rng,
        );
        Self::new(EmbeddingData::Trainable(table))
    }

    /// Loads a frozen table through an external provider, checking that the
    /// reported metadata agrees with the matrix it returned.
    pub fn from_provider(provider: &dyn EmbeddingProvider) -> PgnResult<Self> {
        let (table, metadata) = provider.load().map_err(PgnError::Provider)?;
        let shape = (table.nrows(), table.ncols());
        if shape != (metadata.vocab_size, metadata.embedding_dim) {
            return Err(PgnError::shape_mismatch(
                "Embeddings::from_provider",
                (metadata.vocab_size, metadata.embedding_dim),
                shape,
            ));
        }
        log::debug!(
            "Loaded frozen embeddings {}x{} from {}",
            shape.0,
            shape.1,
            metadata.source.as_deref().unwrap_or("<unnamed provider>")
        );
        Ok(Self::frozen(Arc::new(table)))
    }

    pub fn vocab_size(&self) -> usize {
        self.word_embeddings.table().nrows()
    }

    pub fn embedding_dim(&self) -> usize {
        self.word_embeddings.table().ncols()
    }

    pub fn is_trainable(&self) -> bool {
        self.word_embeddings.is_trainable()
    }

    /// Mutable access to an owned table. Frozen tables return `None`.
    pub fn table_mut(&mut self) -> Option<&mut Array2<f32>> {
        match &mut self.word_embeddings {
            EmbeddingData::Trainable(arr) => Some(arr),
            EmbeddingData::Frozen(_) => None,
        }
    }

    /// Embeds a `[batch, seq_len]` id matrix into `[batch, seq_len, embedding_dim]`.
    pub fn forward(&self, input_ids: &Array2<u32>) -> PgnResult<Array3<f32>> {
        self.check_ids(input_ids.iter())?;

        let (batch_size, seq_len) = input_ids.dim();
        let mut hidden = Array3::<f32>::zeros((batch_size, seq_len, self.embedding_dim()));
        let table = self.word_embeddings.table();

        hidden
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(input_ids.axis_iter(Axis(0)))
            .for_each(|(mut hidden_slice, ids)| {
                for (j, &token_id) in ids.iter().enumerate() {
                    hidden_slice
                        .slice_mut(s![j, ..])
                        .assign(&table.row(token_id as usize));
                }
            });

        Ok(hidden)
    }

    /// Embeds one token per batch row: `[batch]` → `[batch, embedding_dim]`.
    pub fn lookup(&self, ids: &ArrayView1<u32>) -> PgnResult<Array2<f32>> {
        self.check_ids(ids.iter())?;

        let table = self.word_embeddings.table();
        let mut out = Array2::<f32>::zeros((ids.len(), self.embedding_dim()));
        for (mut row, &id) in out.outer_iter_mut().zip(ids.iter()) {
            row.assign(&table.row(id as usize));
        }
        Ok(out)
    }

    fn check_ids<'a>(&self, mut ids: impl Iterator<Item = &'a u32>) -> PgnResult<()> {
        let vocab_size = self.vocab_size();
        match ids.find(|&&id| id as usize >= vocab_size) {
            Some(&id) => Err(PgnError::shape_mismatch(
                "Embeddings token id",
                format!("id < {}", vocab_size),
                id,
            )),
            None => Ok(()),
        }
    }
}
