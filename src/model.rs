//! word2vec Models
//!
//! This module implements the two classic word2vec architectures on top of the
//! batches produced by [`WindowIterator`](crate::WindowIterator):
//!
//! - **Skip-gram**: every context word, on its own, predicts the center word
//! - **CBOW** (continuous bag of words): the average of the context words
//!   predicts the center word
//!
//! ```text
//! Skip-gram (w = 2)                     CBOW (w = 2)
//!
//!  c-2 ─┐                                c-2 ─┐
//!  c-1 ─┤                                c-1 ─┤
//!       ├──► center  (4 predictions)          ├─ mean ─► center  (1 prediction)
//!  c+1 ─┤                                c+1 ─┤
//!  c+2 ─┘                                c+2 ─┘
//! ```
//!
//! ## Parameters
//!
//! - `embed` `[vocab, dim]`: input embeddings, the vectors we keep after training
//! - `out_weight` `[vocab, dim]`: output embeddings used by the loss
//!
//! ## Output Layers
//!
//! **Full softmax** scores the hidden vector `h` against every word:
//!
//! ```text
//! loss = logsumexp(W·h) - W[target]·h
//! ```
//!
//! **Negative sampling** only scores the target and `k` noise words drawn from
//! the unigram distribution raised to 0.75:
//!
//! ```text
//! loss = -ln σ(W[target]·h) - Σₖ ln σ(-W[noiseₖ]·h)
//! ```
//!
//! Both losses have simple closed-form gradients with respect to the score, so
//! the backward pass is written out by hand below rather than going through a
//! general autodiff engine.
//!
//! ## Train vs Eval
//!
//! The caller states the mode explicitly on every forward call. In
//! [`Mode::Train`] the gradients are returned alongside the loss; in
//! [`Mode::Eval`] only the loss is computed.

use crate::error::{Error, Result};
use crate::tensor::{axpy, dot, Tensor};
use crate::window::ContextBatch;
use rand::Rng;
use rand_distr::weighted::WeightedAliasIndex;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};

/// Forward-pass mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Compute the loss and its gradients
    Train,
    /// Compute the loss only
    Eval,
}

/// Which word2vec architecture to train
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    SkipGram,
    Cbow,
}

/// Which output layer computes the loss
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputKind {
    /// Score the target against `samples` noise words
    NegativeSampling { samples: usize },
    /// Normalise over the whole vocabulary
    Softmax,
}

/// Draws noise words in proportion to `count^power`
///
/// Uses Walker's alias method, so each draw is O(1) regardless of vocabulary
/// size.
#[derive(Clone, Debug)]
pub struct NegativeSampler {
    table: WeightedAliasIndex<f32>,
}

impl NegativeSampler {
    /// Standard word2vec smoothing exponent
    pub const POWER: f32 = 0.75;

    /// Build the alias table from word frequencies
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the counts are empty or all zero
    pub fn new(counts: &[usize], power: f32) -> Result<Self> {
        let weights: Vec<f32> = counts.iter().map(|&c| (c as f32).powf(power)).collect();
        let table = WeightedAliasIndex::new(weights).map_err(|e| {
            Error::InvalidParameter(format!("cannot build negative sampler: {}", e))
        })?;
        Ok(Self { table })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.table.sample(rng)
    }
}

/// Result of a forward pass
pub struct Forward {
    /// Mean loss per prediction
    pub loss: f32,
    /// Number of predictions the loss is averaged over
    pub predictions: usize,
    /// Gradients of the mean loss, present only in [`Mode::Train`]
    pub grads: Option<Gradients>,
}

/// Gradients for both embedding tables
///
/// Dense and shaped exactly like the parameters they belong to.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub embed: Tensor,
    pub out_weight: Tensor,
}

impl Gradients {
    pub fn zeros_like(model: &Word2Vec) -> Self {
        Self {
            embed: Tensor::zeros(model.embed.shape.clone()),
            out_weight: Tensor::zeros(model.out_weight.shape.clone()),
        }
    }
}

/// Loss layer together with the state it needs
#[derive(Clone, Debug)]
enum OutputLayer {
    NegativeSampling { samples: usize, sampler: NegativeSampler },
    Softmax,
}

/// A word2vec model: input embeddings plus an output layer
///
/// The output layer is fixed at construction; [`Word2Vec::output`] reports
/// which one was chosen.
#[derive(Clone, Debug)]
pub struct Word2Vec {
    pub kind: ModelKind,
    pub embed: Tensor,
    pub out_weight: Tensor,
    output: OutputLayer,
}

impl Word2Vec {
    /// Create a freshly initialised model
    ///
    /// Input embeddings start uniform in `[-1/dim, 1/dim]` and output weights
    /// start at zero.
    ///
    /// # Arguments
    ///
    /// * `vocab_size` - Number of word ids
    /// * `dim` - Embedding width
    /// * `kind` - Skip-gram or CBOW
    /// * `output` - Loss layer
    /// * `counts` - Word frequencies, used by negative sampling
    /// * `rng` - Source of the initial weights
    pub fn new<R: Rng + ?Sized>(
        vocab_size: usize,
        dim: usize,
        kind: ModelKind,
        output: OutputKind,
        counts: &[usize],
        rng: &mut R,
    ) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidParameter("embedding width must be at least 1".into()));
        }
        let embed = Tensor::uniform(vec![vocab_size, dim], 1.0 / dim as f32, rng);
        let out_weight = Tensor::zeros(vec![vocab_size, dim]);
        Self::from_parts(kind, output, embed, out_weight, counts)
    }

    /// Assemble a model from existing weights (used when loading checkpoints)
    pub fn from_parts(
        kind: ModelKind,
        output: OutputKind,
        embed: Tensor,
        out_weight: Tensor,
        counts: &[usize],
    ) -> Result<Self> {
        if embed.shape != out_weight.shape || embed.shape.len() != 2 {
            return Err(Error::ShapeMismatch {
                layer: "word2vec".into(),
                expected: format!("{:?}", embed.shape),
                got: format!("{:?}", out_weight.shape),
            });
        }
        if counts.len() != embed.rows() {
            return Err(Error::ShapeMismatch {
                layer: "negative sampler".into(),
                expected: format!("{} counts", embed.rows()),
                got: format!("{} counts", counts.len()),
            });
        }

        let output = match output {
            OutputKind::NegativeSampling { samples } => {
                if samples == 0 {
                    return Err(Error::InvalidParameter(
                        "negative sampling needs at least one sample".into(),
                    ));
                }
                OutputLayer::NegativeSampling {
                    samples,
                    sampler: NegativeSampler::new(counts, NegativeSampler::POWER)?,
                }
            }
            OutputKind::Softmax => OutputLayer::Softmax,
        };

        Ok(Self {
            kind,
            embed,
            out_weight,
            output,
        })
    }

    /// Loss layer this model was built with
    pub fn output(&self) -> OutputKind {
        match self.output {
            OutputLayer::NegativeSampling { samples, .. } => OutputKind::NegativeSampling { samples },
            OutputLayer::Softmax => OutputKind::Softmax,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.embed.rows()
    }

    pub fn dim(&self) -> usize {
        self.embed.cols()
    }

    /// Learned vector of a word id
    pub fn embedding(&self, id: usize) -> &[f32] {
        self.embed.row(id)
    }

    pub fn count_parameters(&self) -> usize {
        self.embed.numel() + self.out_weight.numel()
    }

    /// Compute the mean loss over a batch
    ///
    /// # Arguments
    ///
    /// * `batch` - Centers and contexts from a window iterator
    /// * `mode` - Whether gradients are needed
    /// * `rng` - Source of noise words for negative sampling
    pub fn forward<R: Rng + ?Sized>(&self, batch: &ContextBatch, mode: Mode, rng: &mut R) -> Forward {
        let predictions = match self.kind {
            ModelKind::SkipGram => batch.contexts.iter().map(Vec::len).sum(),
            ModelKind::Cbow => batch.len(),
        };
        if predictions == 0 {
            return Forward {
                loss: 0.0,
                predictions: 0,
                grads: None,
            };
        }

        let scale = 1.0 / predictions as f32;
        let mut grads = match mode {
            Mode::Train => Some(Gradients::zeros_like(self)),
            Mode::Eval => None,
        };
        let dim = self.dim();
        let mut total_loss = 0.0;
        let mut grad_h = vec![0.0; dim];

        for (&center, context) in batch.centers.iter().zip(&batch.contexts) {
            match self.kind {
                ModelKind::SkipGram => {
                    for &word in context {
                        let h = self.embed.row(word);
                        grad_h.fill(0.0);
                        total_loss += self.output_loss(h, center, scale, &mut grad_h, grads.as_mut(), &mut *rng);
                        if let Some(g) = grads.as_mut() {
                            g.embed.add_to_row(word, 1.0, &grad_h);
                        }
                    }
                }
                ModelKind::Cbow => {
                    if context.is_empty() {
                        continue;
                    }
                    let inv = 1.0 / context.len() as f32;
                    let mut h = vec![0.0; dim];
                    for &word in context {
                        axpy(inv, self.embed.row(word), &mut h);
                    }
                    grad_h.fill(0.0);
                    total_loss += self.output_loss(&h, center, scale, &mut grad_h, grads.as_mut(), &mut *rng);
                    if let Some(g) = grads.as_mut() {
                        for &word in context {
                            g.embed.add_to_row(word, inv, &grad_h);
                        }
                    }
                }
            }
        }

        Forward {
            loss: total_loss * scale,
            predictions,
            grads,
        }
    }

    /// Loss of predicting `target` from hidden vector `h`
    ///
    /// Returns the unscaled loss. Gradients are scaled by `scale`: the output
    /// weight gradient is accumulated into `grads` and the hidden gradient into
    /// `grad_h`.
    fn output_loss<R: Rng + ?Sized>(
        &self,
        h: &[f32],
        target: usize,
        scale: f32,
        grad_h: &mut [f32],
        mut grads: Option<&mut Gradients>,
        rng: &mut R,
    ) -> f32 {
        match &self.output {
            OutputLayer::NegativeSampling { samples, sampler } => {
                // Positive pair: d/ds[-ln σ(s)] = σ(s) - 1
                let w = self.out_weight.row(target);
                let s = dot(h, w);
                let mut loss = softplus(-s);
                if let Some(g) = grads.as_mut() {
                    let coeff = (sigmoid(s) - 1.0) * scale;
                    g.out_weight.add_to_row(target, coeff, h);
                    axpy(coeff, w, grad_h);
                }

                // Noise pairs: d/ds[-ln σ(-s)] = σ(s)
                for _ in 0..*samples {
                    let noise = sampler.sample(&mut *rng);
                    let w = self.out_weight.row(noise);
                    let s = dot(h, w);
                    loss += softplus(s);
                    if let Some(g) = grads.as_mut() {
                        let coeff = sigmoid(s) * scale;
                        g.out_weight.add_to_row(noise, coeff, h);
                        axpy(coeff, w, grad_h);
                    }
                }
                loss
            }
            OutputLayer::Softmax => {
                let logits: Vec<f32> = (0..self.vocab_size())
                    .map(|v| dot(h, self.out_weight.row(v)))
                    .collect();
                let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let sum_exp: f32 = logits.iter().map(|&z| (z - max).exp()).sum();
                let log_z = max + sum_exp.ln();
                let loss = log_z - logits[target];

                if let Some(g) = grads.as_mut() {
                    // d/dz = softmax(z) - onehot(target)
                    for (v, &z) in logits.iter().enumerate() {
                        let mut coeff = (z - log_z).exp();
                        if v == target {
                            coeff -= 1.0;
                        }
                        coeff *= scale;
                        g.out_weight.add_to_row(v, coeff, h);
                        axpy(coeff, self.out_weight.row(v), grad_h);
                    }
                }
                loss
            }
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// `ln(1 + e^x)`, stable for large |x|
fn softplus(x: f32) -> f32 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}
