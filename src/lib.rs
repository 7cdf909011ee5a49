//! skipgram: Educational word2vec Implementation
//!
//! Word embeddings trained from scratch in Rust: a windowed context sampler,
//! skip-gram and CBOW models with negative-sampling or full-softmax output,
//! Adam, checkpointing and nearest-neighbour search. A small companion module
//! describes the classic convolutional classifiers (LeNet-5, VGG-16,
//! ResNet-50) and counts their parameters.
//!
//! # Modules
//!
//! - [`window`] - Windowed context sampler (the heart of word2vec batching)
//! - [`vocab`] - Word-level vocabulary with `<unk>` and `<eos>`
//! - [`dataset`] - Train/validation/test corpus loading
//! - [`tensor`] - Minimal row-major tensor and vector helpers
//! - [`model`] - Skip-gram and CBOW with hand-derived gradients
//! - [`optimizer`] - Adam with decoupled weight decay
//! - [`gradients`] - Gradient norm and clipping
//! - [`config`] - Training hyperparameters and presets
//! - [`training_logger`] - CSV metrics log
//! - [`trainer`] - Epoch-driven training loop
//! - [`checkpoint`] - Binary checkpoints for resuming
//! - [`search`] - word2vec text export and cosine similarity queries
//! - [`arch`] - Convolutional network definitions
//!
//! # Example
//!
//! ```rust,no_run
//! use skipgram::{Corpus, Embeddings, Trainer, TrainingConfig};
//!
//! let corpus = Corpus::from_files("ptb.train.txt", "ptb.valid.txt", "ptb.test.txt", 1)?;
//! let mut trainer = Trainer::new(TrainingConfig::small(), corpus)?;
//! let report = trainer.run()?;
//! println!("best validation loss {:?} at epoch {}", report.best_val_loss, report.best_epoch);
//!
//! let embeddings = Embeddings::from_model(trainer.vocab(), trainer.model())?;
//! println!("{:?}", embeddings.most_similar("monday", 5)?);
//! # Ok::<(), skipgram::Error>(())
//! ```

pub mod arch;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gradients;
pub mod model;
pub mod optimizer;
pub mod search;
pub mod tensor;
pub mod trainer;
pub mod training_logger;
pub mod vocab;
pub mod window;

// Re-export main types for convenience
pub use arch::{LayerSpec, Network, ResidualBlock, Shape, Shortcut};
pub use checkpoint::{Checkpoint, CheckpointMetadata};
pub use config::TrainingConfig;
pub use dataset::{train_val_split, Corpus};
pub use error::{Error, Result};
pub use gradients::{clip_gradients, compute_grad_norm};
pub use model::{Forward, Gradients, Mode, ModelKind, NegativeSampler, OutputKind, Word2Vec};
pub use optimizer::Adam;
pub use search::{save_word2vec_format, Embeddings};
pub use tensor::Tensor;
pub use trainer::{Trainer, TrainingReport};
pub use training_logger::TrainingLogger;
pub use vocab::{Vocabulary, VocabularyStats, EOS, UNK};
pub use window::{ContextBatch, SamplerState, WindowIterator};
