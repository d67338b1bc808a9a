//! Generation probability and the final copy/generate mixture.
//!
//! `p_gen = σ(w_s·s + w_c·c + w_i·x)` decides, per batch row, how much of the
//! output comes from the decoder's vocabulary distribution and how much is
//! copied from the source through the attention weights.

use ndarray::{Array1, Array2, Zip};
use ndarray_rand::rand::Rng;

use crate::activations::sigmoid_scalar;
use crate::error::{PgnError, PgnResult};
use crate::linear_layer::LinearLayer;

#[cfg(test)]
mod tests;

/// p_gen is kept in `[P_GEN_EPS, 1 - P_GEN_EPS]`.
pub const P_GEN_EPS: f32 = 1e-7;

#[derive(Debug, Clone)]
pub struct Pointer {
    /// Decoder hidden state → scalar.
    pub w_s_reduce: LinearLayer,
    /// Context vector → scalar.
    pub w_c_reduce: LinearLayer,
    /// Decoder input → scalar.
    pub w_i_reduce: LinearLayer,
}

impl Pointer {
    pub fn new<R: Rng + ?Sized>(
        context_dim: usize,
        decoder_dim: usize,
        input_dim: usize,
        rng: &mut R,
    ) -> Self {
        log::debug!(
            "Pointer: context_dim={} decoder_dim={} input_dim={}",
            context_dim,
            decoder_dim,
            input_dim
        );
        Self {
            w_s_reduce: LinearLayer::glorot_uniform(1, decoder_dim, true, rng),
            w_c_reduce: LinearLayer::glorot_uniform(1, context_dim, true, rng),
            w_i_reduce: LinearLayer::glorot_uniform(1, input_dim, true, rng),
        }
    }

    pub fn from_parts(
        w_s_reduce: LinearLayer,
        w_c_reduce: LinearLayer,
        w_i_reduce: LinearLayer,
    ) -> PgnResult<Self> {
        let layers = [
            ("w_s_reduce", &w_s_reduce),
            ("w_c_reduce", &w_c_reduce),
            ("w_i_reduce", &w_i_reduce),
        ];
        for (name, layer) in layers {
            if layer.out_features() != 1 {
                return Err(PgnError::shape_mismatch(name, 1, layer.out_features()));
            }
        }
        Ok(Self {
            w_s_reduce,
            w_c_reduce,
            w_i_reduce,
        })
    }

    /// Generation probability per batch row, strictly inside (0, 1).
    pub fn p_gen(
        &self,
        context: &Array2<f32>,
        decoder_hidden: &Array2<f32>,
        decoder_input: &Array2<f32>,
    ) -> PgnResult<Array1<f32>> {
        let batch_size = context.nrows();
        let rows = [
            ("decoder_hidden", decoder_hidden.nrows()),
            ("decoder_input", decoder_input.nrows()),
        ];
        for (name, rows) in rows {
            if rows != batch_size {
                return Err(PgnError::shape_mismatch(name, batch_size, rows));
            }
        }

        let logits = self.w_s_reduce.forward(&decoder_hidden.view())?
            + self.w_c_reduce.forward(&context.view())?
            + self.w_i_reduce.forward(&decoder_input.view())?;

        Ok(logits.column(0).mapv(gate_probability))
    }

    /// `p_gen · vocab + (1 − p_gen) · attention`, over an extended vocabulary.
    ///
    /// Attention mass on source position `t` is added to id `source_ids[b, t]`,
    /// so repeated source tokens accumulate. Ids at or past the decoder vocab
    /// (source-only words) land in the extra `extended_vocab_size - vocab`
    /// slots.
    pub fn final_distribution(
        p_gen: &Array1<f32>,
        vocab_distribution: &Array2<f32>,
        attention: &Array2<f32>,
        source_ids: &Array2<u32>,
        extended_vocab_size: usize,
    ) -> PgnResult<Array2<f32>> {
        let (batch_size, vocab_size) = vocab_distribution.dim();
        if extended_vocab_size < vocab_size {
            return Err(PgnError::shape_mismatch(
                "extended vocabulary size",
                format!(">= {}", vocab_size),
                extended_vocab_size,
            ));
        }
        if p_gen.len() != batch_size {
            return Err(PgnError::shape_mismatch("p_gen", batch_size, p_gen.len()));
        }
        if attention.nrows() != batch_size || attention.dim() != source_ids.dim() {
            return Err(PgnError::shape_mismatch(
                "attention / source ids",
                attention.dim(),
                source_ids.dim(),
            ));
        }
        if let Some(&id) = source_ids.iter().find(|&&id| id as usize >= extended_vocab_size) {
            return Err(PgnError::shape_mismatch(
                "source token id",
                format!("id < {}", extended_vocab_size),
                id,
            ));
        }

        let mut out = Array2::<f32>::zeros((batch_size, extended_vocab_size));
        Zip::from(out.rows_mut())
            .and(p_gen)
            .and(vocab_distribution.rows())
            .and(attention.rows())
            .and(source_ids.rows())
            .for_each(|mut row, &p, vocab, attn, ids| {
                for (slot, &v) in row.iter_mut().zip(vocab.iter()) {
                    *slot = p * v;
                }
                for (&a, &id) in attn.iter().zip(ids.iter()) {
                    row[id as usize] += (1.0 - p) * a;
                }
            });

        Ok(out)
    }
}

/// Sigmoid clamped to `[P_GEN_EPS, 1 - P_GEN_EPS]`.
///
/// Projections of huge inputs can overflow to `+inf` and `-inf` and sum to
/// NaN; such a logit carries no preference and maps to 0.5.
fn gate_probability(logit: f32) -> f32 {
    let logit = if logit.is_nan() { 0.0 } else { logit };
    sigmoid_scalar(logit).clamp(P_GEN_EPS, 1.0 - P_GEN_EPS)
}
