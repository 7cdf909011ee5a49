//! Windowed Context Sampling
//!
//! This module provides the mini-batch iterator used to train skip-gram and CBOW
//! models. Every batch pairs a set of randomly chosen **center** tokens with the
//! tokens around them (their **context**).
//!
//! ## How Batches Are Generated
//!
//! Only positions with at least `window` tokens on each side can be centers, so
//! context extraction never runs off either end of the corpus:
//!
//! ```text
//! Corpus:    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]
//! Window:    2
//! Centers:         [2, 3, 4, 5, 6, 7]          (N - 2C = 6 positions)
//! ```
//!
//! At construction the valid positions are shuffled into a sampling **order**.
//! Each call takes the next `batch_size` positions from that order and draws a
//! radius `w` uniformly from `[1, window]`. For center 4 with `w = 2`:
//!
//! ```text
//! offsets:  -2  -1  [0]  +1  +2
//! context:   2   3   4    5   6   →  context = [2, 3, 5, 6]
//! ```
//!
//! When a batch reaches the end of the order, the order is replaced by a fresh
//! shuffle, the epoch counter goes up by one and the cursor returns to zero. A
//! non-repeating iterator stops after that first pass.
//!
//! ## Example
//!
//! ```rust
//! use skipgram::WindowIterator;
//!
//! let corpus: Vec<usize> = (0..10).collect();
//! let mut iter = WindowIterator::new(&corpus, 2, 4, false, 42)?;
//!
//! while let Some(batch) = iter.next_batch() {
//!     for (center, context) in batch.centers.iter().zip(&batch.contexts) {
//!         assert_eq!(context.len(), 2 * batch.radius);
//!         assert!(!context.contains(center));
//!     }
//! }
//! assert_eq!(iter.epoch(), 1);
//! # Ok::<(), skipgram::Error>(())
//! ```

use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One mini-batch of center tokens and their contexts
///
/// All vectors are aligned: `positions[i]`, `centers[i]` and `contexts[i]`
/// describe the same sample.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextBatch {
    /// Corpus positions of the center tokens
    pub positions: Vec<usize>,
    /// Center token ids
    pub centers: Vec<usize>,
    /// Context token ids, `2 * radius` per center, ordered by offset
    /// `-radius..-1, 1..radius`
    pub contexts: Vec<Vec<usize>>,
    /// Window radius sampled for this batch
    pub radius: usize,
}

impl ContextBatch {
    /// Number of centers in the batch (the last batch of a pass may be short)
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

/// Serializable cursor state of a [`WindowIterator`]
///
/// Holds everything needed to resume sampling exactly where it stopped: the
/// current order, the cursor into it, the epoch counters and the position of
/// the random stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplerState {
    pub cursor: usize,
    pub epoch: usize,
    pub is_new_epoch: bool,
    pub order: Vec<usize>,
    pub seed: u64,
    pub rng_word_pos: u128,
}

/// Mini-batch iterator over (center, context) samples
///
/// Borrows the corpus for its whole lifetime and never modifies it. The
/// iterator exclusively owns its cursor, epoch counter and random stream.
///
/// # Fields
///
/// - `corpus`: Token ids, read-only
/// - `window`: Maximum context radius `C`
/// - `batch_size`: Centers per batch `B`
/// - `repeat`: Whether to keep going after the first full pass
/// - `order`: Shuffled valid center positions for the current epoch
/// - `cursor`: Offset of the next batch within `order`
pub struct WindowIterator<'a> {
    corpus: &'a [usize],
    window: usize,
    batch_size: usize,
    repeat: bool,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    is_new_epoch: bool,
    seed: u64,
    rng: ChaCha8Rng,
}

impl<'a> WindowIterator<'a> {
    /// Create an iterator over `corpus`
    ///
    /// # Arguments
    ///
    /// * `corpus` - Token ids
    /// * `window` - Maximum context radius (at least 1)
    /// * `batch_size` - Centers per batch (at least 1)
    /// * `repeat` - Cycle through epochs forever instead of stopping after one
    /// * `seed` - Seed for the shuffle and radius draws
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if `window` or `batch_size` is zero
    /// - `CorpusTooShort` if the corpus has no valid center position
    pub fn new(
        corpus: &'a [usize],
        window: usize,
        batch_size: usize,
        repeat: bool,
        seed: u64,
    ) -> Result<Self> {
        if window == 0 {
            return Err(Error::InvalidParameter("window must be at least 1".into()));
        }
        if batch_size == 0 {
            return Err(Error::InvalidParameter(
                "batch_size must be at least 1".into(),
            ));
        }
        if corpus.len() <= 2 * window {
            return Err(Error::CorpusTooShort {
                len: corpus.len(),
                window,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<usize> = (window..corpus.len() - window).collect();
        order.shuffle(&mut rng);

        tracing::debug!(
            positions = order.len(),
            window,
            batch_size,
            repeat,
            "window iterator created"
        );

        Ok(Self {
            corpus,
            window,
            batch_size,
            repeat,
            order,
            cursor: 0,
            epoch: 0,
            is_new_epoch: false,
            seed,
            rng,
        })
    }

    /// Get the next batch of centers and contexts
    ///
    /// Returns `None` once a non-repeating iterator has finished its pass. A
    /// repeating iterator never returns `None`.
    pub fn next_batch(&mut self) -> Option<ContextBatch> {
        if !self.repeat && self.epoch > 0 {
            return None;
        }

        let start = self.cursor;
        let end = (start + self.batch_size).min(self.order.len());
        let positions = self.order[start..end].to_vec();

        let radius = self.rng.random_range(1..=self.window);
        let centers = positions.iter().map(|&p| self.corpus[p]).collect();
        let contexts = positions
            .iter()
            .map(|&p| self.contexts_at(p, radius))
            .collect();

        if start + self.batch_size >= self.order.len() {
            // Replace the order rather than reusing it in place
            let mut order = self.order.clone();
            order.shuffle(&mut self.rng);
            self.order = order;
            self.epoch += 1;
            self.is_new_epoch = true;
            self.cursor = 0;
        } else {
            self.is_new_epoch = false;
            self.cursor = start + self.batch_size;
        }

        Some(ContextBatch {
            positions,
            centers,
            contexts,
            radius,
        })
    }

    /// Context token ids around `position` for a given radius
    ///
    /// # Panics
    ///
    /// Panics if `radius` exceeds the window or `position` is not a valid center.
    pub fn contexts_at(&self, position: usize, radius: usize) -> Vec<usize> {
        assert!(
            (1..=self.window).contains(&radius),
            "radius {} outside [1, {}]",
            radius,
            self.window
        );
        assert!(
            position >= self.window && position + self.window < self.corpus.len(),
            "position {} is not a valid center",
            position
        );
        let left = &self.corpus[position - radius..position];
        let right = &self.corpus[position + 1..=position + radius];
        left.iter().chain(right).copied().collect()
    }

    /// Fractional progress through training: `epoch + cursor / len(order)`
    pub fn epoch_detail(&self) -> f64 {
        self.epoch as f64 + self.cursor as f64 / self.order.len() as f64
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Whether the most recent batch completed an epoch
    pub fn is_new_epoch(&self) -> bool {
        self.is_new_epoch
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of valid center positions (`N - 2C`)
    pub fn positions_per_epoch(&self) -> usize {
        self.order.len()
    }

    /// Number of batches in one pass: `ceil((N - 2C) / B)`
    pub fn batches_per_epoch(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Start over from epoch zero with a fresh shuffle
    pub fn reset(&mut self) {
        let mut order = self.order.clone();
        order.shuffle(&mut self.rng);
        self.order = order;
        self.cursor = 0;
        self.epoch = 0;
        self.is_new_epoch = false;
    }

    /// Snapshot the cursor state for checkpointing
    pub fn state(&self) -> SamplerState {
        SamplerState {
            cursor: self.cursor,
            epoch: self.epoch,
            is_new_epoch: self.is_new_epoch,
            order: self.order.clone(),
            seed: self.seed,
            rng_word_pos: self.rng.get_word_pos(),
        }
    }

    /// Resume from a previously saved state
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the state does not belong to this corpus and window:
    /// the order must be a permutation of the valid center positions and the
    /// cursor must lie inside it.
    pub fn restore(&mut self, state: SamplerState) -> Result<()> {
        let mut sorted = state.order.clone();
        sorted.sort_unstable();
        let expected = self.window..self.corpus.len() - self.window;
        if sorted.len() != expected.len() || !sorted.iter().copied().eq(expected) {
            return Err(Error::InvalidParameter(
                "sampler order is not a permutation of this corpus' center positions".into(),
            ));
        }
        if state.cursor >= state.order.len() {
            return Err(Error::InvalidParameter(format!(
                "sampler cursor {} out of range for {} positions",
                state.cursor,
                state.order.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(state.seed);
        rng.set_word_pos(state.rng_word_pos);

        self.order = state.order;
        self.cursor = state.cursor;
        self.epoch = state.epoch;
        self.is_new_epoch = state.is_new_epoch;
        self.seed = state.seed;
        self.rng = rng;
        Ok(())
    }
}

impl Iterator for WindowIterator<'_> {
    type Item = ContextBatch;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
