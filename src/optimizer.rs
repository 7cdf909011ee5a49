//! Adam Optimizer
//!
//! Adam is the optimizer used by the reference word2vec training recipe. It
//! keeps two running averages per parameter:
//!
//! - **Momentum** (`m`): exponential moving average of gradients
//! - **Variance** (`v`): exponential moving average of squared gradients
//!
//! ## Algorithm
//!
//! For each parameter θ with gradient g:
//!
//! ```text
//! θ = θ * (1 - α * λ)              # Decoupled weight decay (only if λ > 0)
//! m = β₁ * m + (1 - β₁) * g        # First moment
//! v = β₂ * v + (1 - β₂) * g²       # Second moment
//! m_hat = m / (1 - β₁^t)           # Bias correction
//! v_hat = v / (1 - β₂^t)           # Bias correction
//! θ = θ - α * m_hat / (√v_hat + ε) # Parameter update
//! ```
//!
//! Defaults: α = 0.001, β₁ = 0.9, β₂ = 0.999, ε = 1e-8, λ = 0.
//!
//! ## Bias Correction
//!
//! `m` and `v` start at zero, so without the `(1 - β^t)` terms they are biased
//! toward zero during the first steps.
//!
//! ## Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use skipgram::{Adam, Gradients, ModelKind, OutputKind, Word2Vec};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(0);
//! let mut model = Word2Vec::new(10, 8, ModelKind::SkipGram, OutputKind::Softmax, &[1; 10], &mut rng)?;
//! let mut adam = Adam::new(&model, 1e-3);
//!
//! let grads = Gradients::zeros_like(&model);
//! adam.update(&mut model, &grads);
//! assert_eq!(adam.step, 1);
//! # Ok::<(), skipgram::Error>(())
//! ```

use crate::model::{Gradients, Word2Vec};
use crate::tensor::Tensor;
use rayon::prelude::*;

/// Tensors above this size are updated in parallel
const PARALLEL_THRESHOLD: usize = 1000;

/// Adam moment estimates for a single tensor
#[derive(Clone, Debug)]
pub struct Moments {
    pub m: Tensor,
    pub v: Tensor,
}

impl Moments {
    fn zeros_like(t: &Tensor) -> Self {
        Self {
            m: Tensor::zeros(t.shape.clone()),
            v: Tensor::zeros(t.shape.clone()),
        }
    }
}

/// Adam optimizer state
///
/// # Fields
///
/// - `embed`, `out_weight`: moment estimates mirroring the model's tensors
/// - `alpha`: learning rate
/// - `weight_decay`: decoupled weight decay λ (0 disables it)
/// - `step`: number of updates applied so far (for bias correction)
#[derive(Clone, Debug)]
pub struct Adam {
    pub embed: Moments,
    pub out_weight: Moments,
    pub alpha: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub weight_decay: f32,
    pub step: usize,
}

impl Adam {
    /// Create an optimizer for `model` with zeroed moments
    pub fn new(model: &Word2Vec, alpha: f32) -> Self {
        Self {
            embed: Moments::zeros_like(&model.embed),
            out_weight: Moments::zeros_like(&model.out_weight),
            alpha,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
            step: 0,
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Apply one Adam step to every model parameter
    pub fn update(&mut self, model: &mut Word2Vec, grads: &Gradients) {
        self.step += 1;
        let step = self.step as i32;
        let hyper = StepParams {
            lr: self.alpha,
            weight_decay: self.weight_decay,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            bias_correction1: 1.0 - self.beta1.powi(step),
            bias_correction2: 1.0 - self.beta2.powi(step),
        };

        update_tensor(&mut model.embed, &grads.embed, &mut self.embed, &hyper);
        update_tensor(&mut model.out_weight, &grads.out_weight, &mut self.out_weight, &hyper);
    }
}

struct StepParams {
    lr: f32,
    weight_decay: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    bias_correction1: f32,
    bias_correction2: f32,
}

impl StepParams {
    #[inline]
    fn apply(&self, param: &mut f32, grad: f32, m: &mut f32, v: &mut f32) {
        if self.weight_decay > 0.0 {
            *param *= 1.0 - self.lr * self.weight_decay;
        }
        *m = self.beta1 * *m + (1.0 - self.beta1) * grad;
        *v = self.beta2 * *v + (1.0 - self.beta2) * grad * grad;
        let m_hat = *m / self.bias_correction1;
        let v_hat = *v / self.bias_correction2;
        *param -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
    }
}

fn update_tensor(param: &mut Tensor, grad: &Tensor, moments: &mut Moments, hyper: &StepParams) {
    if param.data.len() > PARALLEL_THRESHOLD {
        param
            .data
            .par_iter_mut()
            .zip(grad.data.par_iter())
            .zip(moments.m.data.par_iter_mut().zip(moments.v.data.par_iter_mut()))
            .for_each(|((p, &g), (m, v))| hyper.apply(p, g, m, v));
    } else {
        // Sequential for small tensors to avoid parallelization overhead
        for (((p, &g), m), v) in param
            .data
            .iter_mut()
            .zip(&grad.data)
            .zip(moments.m.data.iter_mut())
            .zip(moments.v.data.iter_mut())
        {
            hyper.apply(p, g, m, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, OutputKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model(vocab: usize, dim: usize) -> Word2Vec {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        Word2Vec::new(vocab, dim, ModelKind::SkipGram, OutputKind::Softmax, &vec![1; vocab], &mut rng).unwrap()
    }

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        // After bias correction the first step is lr * sign(g)
        let mut m = model(3, 2);
        let before = m.out_weight.data.clone();
        let mut grads = Gradients::zeros_like(&m);
        grads.out_weight.data = vec![0.5, -2.0, 0.0, 1.0, 3.0, -0.1];

        let mut adam = Adam::new(&m, 0.01);
        adam.update(&mut m, &grads);

        let expected = [-0.01, 0.01, 0.0, -0.01, -0.01, 0.01];
        for i in 0..6 {
            assert!((m.out_weight.data[i] - before[i] - expected[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_gradient_leaves_parameters() {
        let mut m = model(4, 3);
        let before = m.embed.data.clone();
        let grads = Gradients::zeros_like(&m);
        let mut adam = Adam::new(&m, 0.1);
        for _ in 0..3 {
            adam.update(&mut m, &grads);
        }
        assert_eq!(m.embed.data, before);
        assert_eq!(adam.step, 3);
    }

    #[test]
    fn test_weight_decay_shrinks_parameters() {
        let mut m = model(2, 2);
        m.embed.data = vec![1.0, 1.0, 1.0, 1.0];
        let grads = Gradients::zeros_like(&m);
        let mut adam = Adam::new(&m, 0.1).with_weight_decay(0.5);
        adam.update(&mut m, &grads);
        assert!(m.embed.data.iter().all(|&v| (v - 0.95).abs() < 1e-6));
    }

    #[test]
    fn test_parallel_and_sequential_paths_agree() {
        let mut large = model(100, 20);
        let mut small = model(100, 20);
        let mut grads = Gradients::zeros_like(&large);
        for (i, g) in grads.embed.data.iter_mut().enumerate() {
            *g = (i as f32 * 0.37).sin();
        }

        let hyper = StepParams {
            lr: 0.01,
            weight_decay: 0.0,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            bias_correction1: 0.1,
            bias_correction2: 0.001,
        };
        let mut moments = Moments::zeros_like(&large.embed);
        update_tensor(&mut large.embed, &grads.embed, &mut moments, &hyper);

        let mut moments = Moments::zeros_like(&small.embed);
        for i in 0..small.embed.data.len() {
            let (m, v) = (&mut moments.m.data[i], &mut moments.v.data[i]);
            hyper.apply(&mut small.embed.data[i], grads.embed.data[i], m, v);
        }
        assert_eq!(large.embed.data, small.embed.data);
    }
}
