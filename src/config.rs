//! Training Configuration
//!
//! Hyperparameters for a word2vec run. The defaults follow the classic
//! Penn Treebank word2vec recipe: 100-dimensional skip-gram vectors, window 5,
//! negative sampling with 5 noise words, Adam, 20 epochs.
//!
//! # Presets
//!
//! - **Default**: the full recipe above
//! - **Small**: 50 dimensions, 5 epochs, for a first look at a real corpus
//! - **Tiny**: a few seconds of training, for smoke tests and walkthroughs
//!
//! Configurations round-trip through JSON so a run can be described in a file:
//!
//! ```json
//! {
//!   "unit": 100,
//!   "window": 5,
//!   "batch_size": 1000,
//!   "epochs": 20,
//!   "model": "skip_gram",
//!   "output": { "type": "negative_sampling", "samples": 5 },
//!   "learning_rate": 0.001,
//!   "weight_decay": 0.0,
//!   "max_grad_norm": null,
//!   "min_count": 1,
//!   "seed": 0,
//!   "out_dir": "result",
//!   "snapshot_every_epoch": true
//! }
//! ```

use crate::error::{Error, Result};
use crate::model::{ModelKind, OutputKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Embedding width
    pub unit: usize,
    /// Maximum context radius
    pub window: usize,
    /// Centers per mini-batch
    pub batch_size: usize,
    /// Passes over the training split
    pub epochs: usize,
    pub model: ModelKind,
    pub output: OutputKind,
    /// Adam step size
    pub learning_rate: f32,
    /// Decoupled weight decay (0 disables it)
    pub weight_decay: f32,
    /// Clip the gradient norm to this value when set
    pub max_grad_norm: Option<f32>,
    /// Words rarer than this become `<unk>`
    pub min_count: usize,
    pub seed: u64,
    /// Where logs, snapshots and exported vectors are written
    pub out_dir: PathBuf,
    /// Write a checkpoint after every epoch
    pub snapshot_every_epoch: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            unit: 100,
            window: 5,
            batch_size: 1000,
            epochs: 20,
            model: ModelKind::SkipGram,
            output: OutputKind::NegativeSampling { samples: 5 },
            learning_rate: 1e-3,
            weight_decay: 0.0,
            max_grad_norm: None,
            min_count: 1,
            seed: 0,
            out_dir: PathBuf::from("result"),
            snapshot_every_epoch: true,
        }
    }
}

impl TrainingConfig {
    /// Seconds-long runs for smoke tests and walkthroughs
    pub fn tiny() -> Self {
        Self {
            unit: 16,
            window: 2,
            batch_size: 32,
            epochs: 3,
            output: OutputKind::NegativeSampling { samples: 3 },
            learning_rate: 1e-2,
            snapshot_every_epoch: false,
            ..Self::default()
        }
    }

    /// A first look at a real corpus
    pub fn small() -> Self {
        Self {
            unit: 50,
            window: 3,
            batch_size: 500,
            epochs: 5,
            learning_rate: 3e-3,
            ..Self::default()
        }
    }

    /// Look up a preset by name (`tiny`, `small` or `default`)
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "tiny" => Some(Self::tiny()),
            "small" => Some(Self::small()),
            "default" => Some(Self::default()),
            _ => None,
        }
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("unit", self.unit),
            ("window", self.window),
            ("batch_size", self.batch_size),
            ("epochs", self.epochs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::InvalidParameter(format!("{} must be at least 1", name)));
            }
        }
        if let OutputKind::NegativeSampling { samples: 0 } = self.output {
            return Err(Error::InvalidParameter(
                "negative sampling needs at least one sample".into(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.weight_decay >= 0.0 && self.weight_decay.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "weight_decay must be non-negative, got {}",
                self.weight_decay
            )));
        }
        if let Some(max) = self.max_grad_norm {
            if !(max > 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "max_grad_norm must be positive, got {}",
                    max
                )));
            }
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
