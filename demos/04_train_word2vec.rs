//! Train word2vec
//!
//! Trains skip-gram or CBOW embeddings on a corpus, using a named preset, a
//! JSON configuration file, or command-line overrides.
//!
//! ## What You'll Learn
//!
//! - The complete training loop (sample, forward, clip, Adam update)
//! - Validation once per epoch and best-epoch tracking
//! - Checkpointing and resuming an interrupted run
//! - Exporting vectors for similarity search
//!
//! ## Usage
//!
//! ```bash
//! # Penn Treebank with the classic recipe
//! cargo run --release --example 04_train_word2vec -- \
//!     --train ptb.train.txt --valid ptb.valid.txt --test ptb.test.txt
//!
//! # Quick smoke test on any text file (last 10% of lines for validation)
//! cargo run --release --example 04_train_word2vec -- --data corpus.txt --preset tiny
//!
//! # CBOW with a full softmax output
//! cargo run --release --example 04_train_word2vec -- \
//!     --data corpus.txt --model cbow --out-type softmax
//!
//! # Continue from a snapshot for two more epochs
//! cargo run --release --example 04_train_word2vec -- \
//!     --data corpus.txt --resume result/snapshot_epoch_3.bin --epochs 5
//! ```
//!
//! ## Output
//!
//! Everything is written to `--out-dir` (default `result/`):
//! - `config.json` - The configuration used
//! - `log.csv` - One row of metrics per epoch
//! - `snapshot_epoch_<n>.bin` - Checkpoints, if enabled
//! - `checkpoint_final.bin` - State at the end of the run
//! - `word2vec.model` - Vectors in word2vec text format (see `05_search`)

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use skipgram::{Checkpoint, Corpus, ModelKind, OutputKind, Trainer, TrainingConfig};
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Skipgram,
    Cbow,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutArg {
    /// Negative sampling
    Ns,
    Softmax,
}

#[derive(Parser)]
#[command(name = "04_train_word2vec", about = "Train word2vec embeddings")]
struct Args {
    /// Training split (use with --valid)
    #[arg(long)]
    train: Option<PathBuf>,

    /// Validation split
    #[arg(long)]
    valid: Option<PathBuf>,

    /// Test split, evaluated once at the end
    #[arg(long)]
    test: Option<PathBuf>,

    /// Single text file, split by lines into train and validation
    #[arg(long)]
    data: Option<PathBuf>,

    /// Fraction of lines held out when using --data
    #[arg(long, default_value_t = 0.1)]
    val_fraction: f32,

    /// Named preset: tiny, small or default
    #[arg(long)]
    preset: Option<String>,

    /// JSON configuration file (replaces the preset)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resume from a checkpoint written by an earlier run (only --epochs may
    /// change its configuration)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Embedding width
    #[arg(long)]
    unit: Option<usize>,

    /// Maximum context radius
    #[arg(long)]
    window: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Total epochs (also extends a resumed run)
    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long, value_enum)]
    model: Option<ModelArg>,

    #[arg(long, value_enum)]
    out_type: Option<OutArg>,

    /// Noise words per prediction for negative sampling (default 5)
    #[arg(long)]
    negative_size: Option<usize>,

    #[arg(long)]
    lr: Option<f32>,

    #[arg(long)]
    grad_clip: Option<f32>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    out_dir: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> anyhow::Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => {
                let name = self.preset.as_deref().unwrap_or("default");
                match TrainingConfig::preset(name) {
                    Some(config) => config,
                    None => bail!("unknown preset {:?} (try tiny, small or default)", name),
                }
            }
        };

        if let Some(unit) = self.unit {
            config.unit = unit;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(model) = self.model {
            config.model = match model {
                ModelArg::Skipgram => ModelKind::SkipGram,
                ModelArg::Cbow => ModelKind::Cbow,
            };
        }
        if let Some(out) = self.out_type {
            config.output = match (out, config.output) {
                (OutArg::Ns, OutputKind::NegativeSampling { samples }) => {
                    OutputKind::NegativeSampling { samples }
                }
                (OutArg::Ns, OutputKind::Softmax) => OutputKind::NegativeSampling { samples: 5 },
                (OutArg::Softmax, _) => OutputKind::Softmax,
            };
        }
        if let Some(negative_size) = self.negative_size {
            match &mut config.output {
                OutputKind::NegativeSampling { samples } => *samples = negative_size,
                OutputKind::Softmax => {
                    bail!("--negative-size needs a negative sampling output (--out-type ns)")
                }
            }
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if self.grad_clip.is_some() {
            config.max_grad_norm = self.grad_clip;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir = out_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply the flags a resumed run accepts
    ///
    /// Everything but `--epochs` is fixed by the checkpoint, so other
    /// configuration flags are refused rather than ignored.
    fn resume_config(&self, mut config: TrainingConfig) -> anyhow::Result<TrainingConfig> {
        let given = [
            ("--preset", self.preset.is_some()),
            ("--config", self.config.is_some()),
            ("--unit", self.unit.is_some()),
            ("--window", self.window.is_some()),
            ("--batch-size", self.batch_size.is_some()),
            ("--model", self.model.is_some()),
            ("--out-type", self.out_type.is_some()),
            ("--negative-size", self.negative_size.is_some()),
            ("--lr", self.lr.is_some()),
            ("--grad-clip", self.grad_clip.is_some()),
            ("--seed", self.seed.is_some()),
            ("--out-dir", self.out_dir.is_some()),
        ];
        let conflicts: Vec<&str> = given
            .iter()
            .filter(|(_, set)| *set)
            .map(|(flag, _)| *flag)
            .collect();
        if !conflicts.is_empty() {
            bail!(
                "{} cannot be combined with --resume; the checkpoint fixes the configuration",
                conflicts.join(", ")
            );
        }

        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        config.validate()?;
        Ok(config)
    }

    fn corpus(&self, min_count: usize) -> anyhow::Result<Corpus> {
        match (&self.train, &self.valid, &self.data) {
            (Some(train), Some(valid), None) => {
                let train_text = std::fs::read_to_string(train)
                    .with_context(|| format!("reading {}", train.display()))?;
                let valid_text = std::fs::read_to_string(valid)
                    .with_context(|| format!("reading {}", valid.display()))?;
                let test_text = match &self.test {
                    Some(test) => std::fs::read_to_string(test)
                        .with_context(|| format!("reading {}", test.display()))?,
                    None => String::new(),
                };
                Ok(Corpus::from_texts(&train_text, &valid_text, &test_text, min_count))
            }
            (None, None, Some(data)) => Corpus::from_file_split(data, self.val_fraction, min_count)
                .with_context(|| format!("reading {}", data.display())),
            _ => bail!("pass either --train and --valid, or --data"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skipgram=info")),
        )
        .init();

    let args = Args::parse();

    let mut trainer = match &args.resume {
        Some(path) => {
            let mut checkpoint =
                Checkpoint::load(path).with_context(|| format!("loading {}", path.display()))?;
            checkpoint.config = args.resume_config(checkpoint.config)?;
            let corpus = args.corpus(checkpoint.config.min_count)?;
            Trainer::resume(checkpoint, corpus)?
        }
        None => {
            let config = args.config()?;
            let corpus = args.corpus(config.min_count)?;
            Trainer::new(config, corpus)?
        }
    };

    let config = trainer.config().clone();
    std::fs::create_dir_all(&config.out_dir)?;
    config.save_json(config.out_dir.join("config.json"))?;

    println!("=== Configuration ===");
    println!("  Model:      {:?} / {:?}", config.model, config.output);
    println!("  Unit:       {}", config.unit);
    println!("  Window:     {}", config.window);
    println!("  Batch size: {}", config.batch_size);
    println!("  Epochs:     {}", config.epochs);
    println!("  Vocabulary: {}", trainer.vocab().len());
    println!("  Parameters: {}\n", trainer.model().count_parameters());

    let report = trainer.run()?;
    trainer.checkpoint().save(config.out_dir.join("checkpoint_final.bin"))?;

    println!("\n=== Results ===");
    println!("  Epochs:           {}", report.epochs);
    println!("  Iterations:       {}", report.iterations);
    println!("  Final train loss: {:.4}", report.final_train_loss);
    match report.best_val_loss {
        Some(loss) => println!("  Best val loss:    {:.4} (epoch {})", loss, report.best_epoch),
        None => println!("  Best val loss:    n/a"),
    }

    if args.test.is_some() {
        match trainer.evaluate(&trainer.corpus().test) {
            Ok(loss) => println!("  Test loss:        {:.4}", loss),
            Err(e) => println!("  Test loss:        skipped ({})", e),
        }
    }

    println!("\n✓ Vectors written to {}", config.out_dir.join("word2vec.model").display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(flags: &[&str]) -> Args {
        let argv = ["04_train_word2vec", "--data", "corpus.txt"];
        Args::try_parse_from(argv.iter().chain(flags).copied()).unwrap()
    }

    #[test]
    fn test_negative_size_applies_to_preset_output() {
        let config = args(&["--negative-size", "9"]).config().unwrap();
        assert_eq!(config.output, OutputKind::NegativeSampling { samples: 9 });

        let config = args(&["--out-type", "ns", "--negative-size", "2"]).config().unwrap();
        assert_eq!(config.output, OutputKind::NegativeSampling { samples: 2 });
    }

    #[test]
    fn test_negative_size_rejected_with_softmax() {
        assert!(args(&["--out-type", "softmax", "--negative-size", "9"]).config().is_err());
        assert_eq!(
            args(&["--out-type", "softmax"]).config().unwrap().output,
            OutputKind::Softmax
        );
    }

    #[test]
    fn test_resume_accepts_only_epochs() {
        let saved = TrainingConfig::tiny();
        let config = args(&["--epochs", "7"]).resume_config(saved.clone()).unwrap();
        assert_eq!(config.epochs, 7);
        assert_eq!(config.unit, saved.unit);

        for flags in [
            &["--lr", "0.1"][..],
            &["--negative-size", "3"],
            &["--out-type", "softmax"],
            &["--preset", "small"],
            &["--out-dir", "elsewhere"],
        ] {
            let err = args(flags).resume_config(saved.clone()).unwrap_err();
            assert!(err.to_string().contains(flags[0]), "{}", err);
        }
    }
}
