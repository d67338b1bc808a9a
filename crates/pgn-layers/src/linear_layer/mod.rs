//! A CPU linear layer (`y = xWᵀ + b`) with Glorot-uniform initialisation.
//!
//! Weights are stored in an `[OutFeatures, InFeatures]` layout, matching the
//! layout the rest of the crate assumes when it inspects `in_features` and
//! `out_features`.

mod linear_layer;

pub use linear_layer::LinearLayer;

use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;

/// Parameter RNG used by every layer constructor.
pub type ParamRng = StdRng;

/// Deterministic parameter RNG for a given seed.
pub fn seeded_rng(seed: u64) -> ParamRng {
    StdRng::seed_from_u64(seed)
}

#[cfg(test)]
mod tests;
