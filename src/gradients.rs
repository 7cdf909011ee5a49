//! Gradient Utilities
//!
//! Gradient norm monitoring and clipping. An occasional batch whose contexts are
//! dominated by a few very frequent words can produce a large update; clipping
//! rescales the whole gradient so its L2 norm never exceeds a threshold.
//!
//! ## Algorithm
//!
//! ```text
//! norm = √(Σ gradient²)
//! if norm > max_norm:
//!     gradients *= max_norm / norm
//! ```
//!
//! Every tensor is scaled by the same factor, so the direction of the update is
//! preserved.

use crate::model::Gradients;
use rayon::prelude::*;

/// Values per partial sum when squaring in parallel
const NORM_CHUNK: usize = 4096;

/// Sum of squares with a fixed reduction order
///
/// Chunk boundaries do not depend on the thread pool and the partial sums are
/// added left to right, so the result is identical on every run.
fn sum_of_squares(data: &[f32]) -> f32 {
    let partials: Vec<f32> = data
        .par_chunks(NORM_CHUNK)
        .map(|chunk| chunk.iter().map(|&v| v * v).sum::<f32>())
        .collect();
    partials.iter().sum()
}

/// L2 norm over all gradient values
pub fn compute_grad_norm(grads: &Gradients) -> f32 {
    (sum_of_squares(&grads.embed.data) + sum_of_squares(&grads.out_weight.data)).sqrt()
}

/// Scale gradients down so their norm is at most `max_norm`
///
/// Returns the norm measured before clipping.
pub fn clip_gradients(grads: &mut Gradients, max_norm: f32) -> f32 {
    let norm = compute_grad_norm(grads);
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        grads.embed.data.par_iter_mut().for_each(|v| *v *= scale);
        grads.out_weight.data.par_iter_mut().for_each(|v| *v *= scale);
    }
    norm
}
