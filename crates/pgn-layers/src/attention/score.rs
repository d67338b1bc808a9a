use crate::activations::{apply_activation, Activation};
use crate::attention::ScoreType;
use crate::error::{PgnError, PgnResult};
use crate::linear_layer::LinearLayer;
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Floor on the squared norm used by cosine scoring, so zero vectors score 0.
const L2_NORM_EPSILON: f32 = 1e-12;

/// The four score functions, each with the parameters it owns.
#[derive(Debug, Clone)]
pub enum ScoreFunction {
    /// `va · tanh(W1·h + W2·s [+ W3·coverage])`
    AdditiveConcat {
        w1: LinearLayer,
        w2: LinearLayer,
        w3: LinearLayer,
        va: LinearLayer,
    },
    /// `h · s`
    DotProduct,
    /// `h · (W1·s)`
    General { w1: LinearLayer },
    /// `(h / |h|) · (s / |s|)`
    CosineSimilarity,
}

impl ScoreFunction {
    pub fn score_type(&self) -> ScoreType {
        match self {
            ScoreFunction::AdditiveConcat { .. } => ScoreType::AdditiveConcat,
            ScoreFunction::DotProduct => ScoreType::DotProduct,
            ScoreFunction::General { .. } => ScoreType::General,
            ScoreFunction::CosineSimilarity => ScoreType::CosineSimilarity,
        }
    }

    pub(crate) fn validate(&self, encoder_dim: usize, decoder_dim: usize) -> PgnResult<()> {
        match self {
            ScoreFunction::AdditiveConcat { w1, w2, w3, va } => {
                let units = w1.out_features();
                expect_shape("additive-concat W1", w1, [units, encoder_dim])?;
                expect_shape("additive-concat W2", w2, [units, decoder_dim])?;
                expect_shape("additive-concat W3", w3, [units, 1])?;
                expect_shape("additive-concat va", va, [1, units])
            }
            ScoreFunction::General { w1 } => {
                expect_shape("general W1", w1, [encoder_dim, decoder_dim])
            }
            ScoreFunction::DotProduct | ScoreFunction::CosineSimilarity => {
                if encoder_dim != decoder_dim {
                    return Err(PgnError::shape_mismatch(
                        "dot/cosine scoring needs decoder width == encoder width",
                        encoder_dim,
                        decoder_dim,
                    ));
                }
                Ok(())
            }
        }
    }

    /// Unnormalised scores `[batch, seq_len]`.
    ///
    /// `prev_coverage` only affects the additive-concat score.
    pub(crate) fn raw_scores(
        &self,
        encoder_outputs: &Array3<f32>,
        decoder_hidden: &Array2<f32>,
        prev_coverage: Option<&Array2<f32>>,
    ) -> PgnResult<Array2<f32>> {
        match self {
            ScoreFunction::AdditiveConcat { w1, w2, w3, va } => {
                let (batch_size, seq_len, _) = encoder_outputs.dim();

                let enc_proj = w1.forward_3d(&encoder_outputs.view())?;
                let dec_proj = w2.forward(&decoder_hidden.view())?.insert_axis(Axis(1));
                let mut features = enc_proj + &dec_proj;

                if let Some(coverage) = prev_coverage {
                    let cov = coverage.view().insert_axis(Axis(2));
                    features += &w3.forward_3d(&cov)?;
                }

                apply_activation(&mut features, Activation::Tanh);
                let scores = va.forward_3d(&features.view())?;
                Ok(scores.into_shape_with_order((batch_size, seq_len))?)
            }
            ScoreFunction::DotProduct => Ok(batched_dot(encoder_outputs, &decoder_hidden.view())),
            ScoreFunction::General { w1 } => {
                let projected = w1.forward(&decoder_hidden.view())?;
                Ok(batched_dot(encoder_outputs, &projected.view()))
            }
            ScoreFunction::CosineSimilarity => {
                let mut enc = encoder_outputs.to_owned();
                for mut row in enc.lanes_mut(Axis(2)) {
                    let norm = row.dot(&row).max(L2_NORM_EPSILON).sqrt();
                    row /= norm;
                }
                let mut dec = decoder_hidden.to_owned();
                for mut row in dec.rows_mut() {
                    let norm = row.dot(&row).max(L2_NORM_EPSILON).sqrt();
                    row /= norm;
                }
                Ok(batched_dot(&enc, &dec.view()))
            }
        }
    }
}

/// `scores[b, t] = encoder_outputs[b, t, :] · query[b, :]`
fn batched_dot(encoder_outputs: &Array3<f32>, query: &ArrayView2<f32>) -> Array2<f32> {
    let (batch_size, seq_len, _) = encoder_outputs.dim();
    let mut scores = Array2::<f32>::zeros((batch_size, seq_len));
    for (b, mut row) in scores.outer_iter_mut().enumerate() {
        row.assign(&encoder_outputs.index_axis(Axis(0), b).dot(&query.row(b)));
    }
    scores
}

fn expect_shape(context: &'static str, layer: &LinearLayer, expected: [usize; 2]) -> PgnResult<()> {
    if layer.shape() != expected {
        return Err(PgnError::shape_mismatch(context, expected, layer.shape()));
    }
    Ok(())
}
