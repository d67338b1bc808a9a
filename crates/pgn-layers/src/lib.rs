//! Building blocks of a pointer-generator summarization network.
//!
//! A recurrent [`Encoder`] reads source token ids, an [`Attention`] layer
//! (optionally tracking coverage) summarises the encoder outputs for every
//! decode step, a [`Decoder`] turns the previous token plus that context into
//! a vocabulary distribution, and the [`Pointer`] gate yields the probability
//! of generating from the vocabulary instead of copying from the source.
//! [`PointerGenerator`] wires the four together into a greedy decode loop.

pub mod activations;
pub mod attention;
pub mod config;
pub mod decoder;
pub mod embeddings;
pub mod encoder;
pub mod error;
pub mod generator;
pub mod linear_layer;
pub mod pointer;
pub mod rnn;

pub use attention::{context_vector, Attention, AttentionOutput, Coverage, ScoreFunction, ScoreType};
pub use config::{AttentionConfig, DecoderConfig, EncoderConfig, Seq2SeqConfig};
pub use decoder::{Decoder, DecoderOutput};
pub use embeddings::{EmbeddingMetadata, EmbeddingProvider, Embeddings, InMemoryEmbeddings};
pub use encoder::{Encoder, EncoderState};
pub use error::{PgnError, PgnResult};
pub use generator::{DecodeStep, PointerGenerator};
pub use linear_layer::{seeded_rng, LinearLayer};
pub use pointer::{Pointer, P_GEN_EPS};
pub use rnn::{RecurrentState, RnnCell, RnnType};
