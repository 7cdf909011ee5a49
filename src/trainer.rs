//! Training Loop
//!
//! [`Trainer`] drives a word2vec run from a [`TrainingConfig`] and a
//! [`Corpus`]:
//!
//! ```text
//! repeat-mode window sampler over corpus.train
//!   │
//!   ├─ batch ─→ forward(Train) ─→ clip (optional) ─→ Adam update
//!   │
//!   └─ epoch boundary
//!        ├─ evaluate corpus.valid (fresh non-repeating sampler, Eval mode)
//!        ├─ append a row to out_dir/log.csv
//!        ├─ snapshot out_dir/snapshot_epoch_<n>.bin (if enabled)
//!        └─ stop once `epochs` passes are done
//! ```
//!
//! After the last epoch the learned vectors are exported in word2vec text
//! format to `out_dir/word2vec.model`.
//!
//! ## Randomness
//!
//! Three independent streams keep runs reproducible:
//!
//! - the window sampler, seeded with `seed`
//! - the model stream (initial weights, then noise words), `seed` on stream 1
//! - the validation stream, reseeded identically before every evaluation so
//!   validation losses of different epochs are comparable
//!
//! Checkpoints record the sampler state and the model stream's position, so a
//! resumed run continues with the same batches and noise words.

use crate::checkpoint::{Checkpoint, CheckpointMetadata};
use crate::config::TrainingConfig;
use crate::dataset::Corpus;
use crate::error::{Error, Result};
use crate::gradients::clip_gradients;
use crate::model::{Mode, Word2Vec};
use crate::optimizer::Adam;
use crate::search::save_word2vec_format;
use crate::training_logger::TrainingLogger;
use crate::vocab::Vocabulary;
use crate::window::{SamplerState, WindowIterator};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;

const MODEL_STREAM: u64 = 1;
const EVAL_STREAM: u64 = 2;

/// Summary of a finished run
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    /// Completed epochs, including any done before a resume
    pub epochs: usize,
    pub iterations: usize,
    /// Mean training loss of the last epoch
    pub final_train_loss: f32,
    pub best_val_loss: Option<f32>,
    pub best_epoch: usize,
}

pub struct Trainer {
    config: TrainingConfig,
    corpus: Corpus,
    model: Word2Vec,
    optimizer: Adam,
    rng: ChaCha8Rng,
    sampler: Option<SamplerState>,
    metadata: CheckpointMetadata,
}

impl Trainer {
    /// Set up a fresh run
    ///
    /// Fails if the configuration is invalid or the training split is too
    /// short for the window.
    pub fn new(config: TrainingConfig, corpus: Corpus) -> Result<Self> {
        config.validate()?;
        // Constructing a sampler checks the split length
        WindowIterator::new(&corpus.train, config.window, config.batch_size, true, config.seed)?;

        let mut rng = model_rng(config.seed);
        let model = Word2Vec::new(
            corpus.vocab_size(),
            config.unit,
            config.model,
            config.output,
            corpus.vocab.counts(),
            &mut rng,
        )?;
        let optimizer = Adam::new(&model, config.learning_rate).with_weight_decay(config.weight_decay);

        tracing::info!(
            model = ?config.model,
            output = ?config.output,
            vocab = corpus.vocab_size(),
            unit = config.unit,
            parameters = model.count_parameters(),
            "trainer ready"
        );

        Ok(Self {
            config,
            corpus,
            model,
            optimizer,
            rng,
            sampler: None,
            metadata: CheckpointMetadata::default(),
        })
    }

    /// Continue a run from a checkpoint
    ///
    /// The corpus must tokenize to the checkpoint's vocabulary, and the
    /// checkpoint must carry optimizer state.
    pub fn resume(checkpoint: Checkpoint, corpus: Corpus) -> Result<Self> {
        let Checkpoint {
            config,
            vocab,
            model,
            optimizer,
            sampler,
            metadata,
        } = checkpoint;

        if vocab.words() != corpus.vocab.words() {
            return Err(Error::Checkpoint(
                "checkpoint vocabulary does not match the corpus".into(),
            ));
        }
        let optimizer = optimizer.ok_or_else(|| {
            Error::Checkpoint("checkpoint has no optimizer state to resume from".into())
        })?;
        config.validate()?;

        let mut rng = model_rng(config.seed);
        rng.set_word_pos(metadata.rng_word_pos);

        tracing::info!(
            epoch = metadata.epoch,
            iteration = metadata.iteration,
            "resuming training"
        );

        Ok(Self {
            config,
            corpus,
            model,
            optimizer,
            rng,
            sampler,
            metadata,
        })
    }

    /// Train until `config.epochs` passes over the training split are done
    pub fn run(&mut self) -> Result<TrainingReport> {
        fs::create_dir_all(&self.config.out_dir)?;
        let mut logger = if self.metadata.epoch == 0 && self.sampler.is_none() {
            TrainingLogger::new(self.out_path("log.csv"))?
        } else {
            TrainingLogger::append(self.out_path("log.csv"))?
        };

        let mut iter = WindowIterator::new(
            &self.corpus.train,
            self.config.window,
            self.config.batch_size,
            true,
            self.config.seed,
        )?;
        if let Some(state) = self.sampler.take() {
            iter.restore(state)?;
        }

        let mut final_train_loss = f32::NAN;
        let mut epoch_loss = 0.0f64;
        let mut epoch_predictions = 0usize;

        while iter.epoch() < self.config.epochs {
            let Some(batch) = iter.next_batch() else {
                break;
            };

            let forward = self.model.forward(&batch, Mode::Train, &mut self.rng);
            epoch_loss += forward.loss as f64 * forward.predictions as f64;
            epoch_predictions += forward.predictions;

            if let Some(mut grads) = forward.grads {
                if let Some(max_norm) = self.config.max_grad_norm {
                    clip_gradients(&mut grads, max_norm);
                }
                self.optimizer.update(&mut self.model, &grads);
            }
            self.metadata.iteration += 1;

            if !iter.is_new_epoch() {
                continue;
            }

            self.metadata.epoch = iter.epoch();
            let train_loss = if epoch_predictions > 0 {
                (epoch_loss / epoch_predictions as f64) as f32
            } else {
                0.0
            };
            final_train_loss = train_loss;
            epoch_loss = 0.0;
            epoch_predictions = 0;

            let val_loss = self.validation_loss()?;
            if let Some(loss) = val_loss {
                let improved = match self.metadata.best_val_loss {
                    Some(best) => loss < best,
                    None => true,
                };
                if improved {
                    self.metadata.best_val_loss = Some(loss);
                    self.metadata.best_epoch = self.metadata.epoch;
                }
            }

            logger.log(
                self.metadata.epoch,
                self.metadata.iteration,
                self.optimizer.alpha,
                train_loss,
                val_loss.unwrap_or(f32::NAN),
            )?;

            if self.config.snapshot_every_epoch {
                let path = self.out_path(&format!("snapshot_epoch_{}.bin", self.metadata.epoch));
                self.snapshot(Some(iter.state())).save(path)?;
            }
        }

        self.sampler = Some(iter.state());
        save_word2vec_format(self.out_path("word2vec.model"), &self.corpus.vocab, &self.model)?;

        Ok(TrainingReport {
            epochs: self.metadata.epoch,
            iterations: self.metadata.iteration,
            final_train_loss,
            best_val_loss: self.metadata.best_val_loss,
            best_epoch: self.metadata.best_epoch,
        })
    }

    /// Mean loss per prediction over one pass of `tokens`
    ///
    /// Uses a fresh non-repeating sampler and a fixed noise stream, so the
    /// same tokens always score the same on the same weights.
    pub fn evaluate(&self, tokens: &[usize]) -> Result<f32> {
        let iter = WindowIterator::new(
            tokens,
            self.config.window,
            self.config.batch_size,
            false,
            self.config.seed,
        )?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(EVAL_STREAM);

        let mut total = 0.0f64;
        let mut predictions = 0usize;
        for batch in iter {
            let forward = self.model.forward(&batch, Mode::Eval, &mut rng);
            total += forward.loss as f64 * forward.predictions as f64;
            predictions += forward.predictions;
        }
        if predictions == 0 {
            return Ok(0.0);
        }
        Ok((total / predictions as f64) as f32)
    }

    /// Everything needed to resume this run later
    pub fn checkpoint(&self) -> Checkpoint {
        self.snapshot(self.sampler.clone())
    }

    pub fn model(&self) -> &Word2Vec {
        &self.model
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.corpus.vocab
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn metadata(&self) -> &CheckpointMetadata {
        &self.metadata
    }

    /// Validation loss, or `None` when the split cannot hold a single window
    fn validation_loss(&self) -> Result<Option<f32>> {
        match self.evaluate(&self.corpus.valid) {
            Ok(loss) => Ok(Some(loss)),
            Err(Error::CorpusTooShort { len, .. }) => {
                tracing::warn!(len, "validation split too short, skipping evaluation");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn snapshot(&self, sampler: Option<SamplerState>) -> Checkpoint {
        let mut metadata = self.metadata.clone();
        metadata.rng_word_pos = self.rng.get_word_pos();
        Checkpoint {
            config: self.config.clone(),
            vocab: self.corpus.vocab.clone(),
            model: self.model.clone(),
            optimizer: Some(self.optimizer.clone()),
            sampler,
            metadata,
        }
    }

    fn out_path(&self, name: &str) -> PathBuf {
        self.config.out_dir.join(name)
    }
}

fn model_rng(seed: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(MODEL_STREAM);
    rng
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, OutputKind};

    const TEXT: &str = "the cat sat on the mat\n\
                        the dog sat on the log\n\
                        a cat and a dog sat on a mat\n\
                        the cat saw the dog on the log\n\
                        a dog saw a cat on the mat";

    fn corpus() -> Corpus {
        Corpus::from_texts(TEXT, "the cat sat on the log\nthe dog saw a mat", "", 1)
    }

    fn config(dir: &std::path::Path) -> TrainingConfig {
        TrainingConfig {
            unit: 8,
            window: 2,
            batch_size: 8,
            epochs: 3,
            learning_rate: 0.05,
            out_dir: dir.to_path_buf(),
            ..TrainingConfig::tiny()
        }
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig {
            snapshot_every_epoch: true,
            ..config(dir.path())
        };
        let mut trainer = Trainer::new(config, corpus()).unwrap();
        let report = trainer.run().unwrap();

        assert_eq!(report.epochs, 3);
        assert!(report.final_train_loss.is_finite());
        assert!(report.best_val_loss.is_some());
        assert!((1..=3).contains(&report.best_epoch));

        let log = fs::read_to_string(dir.path().join("log.csv")).unwrap();
        assert_eq!(log.lines().count(), 4);
        for epoch in 1..=3 {
            assert!(dir.path().join(format!("snapshot_epoch_{}.bin", epoch)).exists());
        }
        assert!(dir.path().join("word2vec.model").exists());
    }

    #[test]
    fn test_iterations_match_batches_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = corpus();
        let config = config(dir.path());
        let expected = WindowIterator::new(&corpus.train, 2, 8, true, 0)
            .unwrap()
            .batches_per_epoch();

        let mut trainer = Trainer::new(config, corpus).unwrap();
        let report = trainer.run().unwrap();
        assert_eq!(report.iterations, 3 * expected);
    }

    #[test]
    fn test_training_reduces_loss() {
        for (model, output) in [
            (ModelKind::SkipGram, OutputKind::Softmax),
            (ModelKind::Cbow, OutputKind::NegativeSampling { samples: 3 }),
        ] {
            let dir = tempfile::tempdir().unwrap();
            let config = TrainingConfig {
                model,
                output,
                epochs: 1,
                ..config(dir.path())
            };
            let corpus = corpus();
            let mut trainer = Trainer::new(config.clone(), corpus.clone()).unwrap();
            let before = trainer.evaluate(&corpus.train).unwrap();

            trainer.config.epochs = 20;
            trainer.run().unwrap();
            let after = trainer.evaluate(&corpus.train).unwrap();
            assert!(after < before, "{:?}/{:?}: {} -> {}", model, output, before, after);
        }
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = corpus();
        let trainer = Trainer::new(config(dir.path()), corpus.clone()).unwrap();
        assert_eq!(
            trainer.evaluate(&corpus.valid).unwrap(),
            trainer.evaluate(&corpus.valid).unwrap()
        );
    }

    #[test]
    fn test_short_validation_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = Corpus::from_texts(TEXT, "cat", "", 1);
        let mut trainer = Trainer::new(config(dir.path()), corpus).unwrap();
        let report = trainer.run().unwrap();
        assert_eq!(report.best_val_loss, None);
    }

    #[test]
    fn test_rejects_short_training_split() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = Corpus::from_texts("a b", "", "", 1);
        assert!(matches!(
            Trainer::new(config(dir.path()), corpus),
            Err(Error::CorpusTooShort { .. })
        ));
    }

    #[test]
    fn test_resume_matches_uninterrupted_run() {
        let straight_dir = tempfile::tempdir().unwrap();
        let mut straight = Trainer::new(config(straight_dir.path()), corpus()).unwrap();
        straight.run().unwrap();

        let split_dir = tempfile::tempdir().unwrap();
        let first = TrainingConfig {
            epochs: 1,
            ..config(split_dir.path())
        };
        let mut trainer = Trainer::new(first, corpus()).unwrap();
        trainer.run().unwrap();

        let path = split_dir.path().join("resume.bin");
        trainer.checkpoint().save(&path).unwrap();
        let mut checkpoint = Checkpoint::load(&path).unwrap();
        checkpoint.config.epochs = 3;

        let mut resumed = Trainer::resume(checkpoint, corpus()).unwrap();
        let report = resumed.run().unwrap();

        assert_eq!(report.epochs, 3);
        assert_eq!(resumed.model().embed, straight.model().embed);
        assert_eq!(resumed.model().out_weight, straight.model().out_weight);

        let log = fs::read_to_string(split_dir.path().join("log.csv")).unwrap();
        assert_eq!(log.lines().count(), 4);
    }

    #[test]
    fn test_resume_requires_optimizer_state() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = Trainer::new(config(dir.path()), corpus()).unwrap();
        let checkpoint = Checkpoint::inference_only(
            trainer.config().clone(),
            trainer.vocab().clone(),
            trainer.model().clone(),
        );
        assert!(matches!(
            Trainer::resume(checkpoint, corpus()),
            Err(Error::Checkpoint(_))
        ));
    }
}
