//! Model Architectures
//!
//! Compares the size of a word2vec model with three classic convolutional
//! image classifiers, and prints their layer-by-layer summaries.
//!
//! ## What You'll Learn
//!
//! - Where word2vec's parameters live (two V×D embedding tables)
//! - How convolution, pooling and fully connected layers change shapes
//! - Why VGG-16 is so large (its first fully connected layer)
//! - How residual blocks choose between identity and projection shortcuts
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example 03_model_architecture
//! cargo run --release --example 03_model_architecture -- --full
//! ```

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skipgram::{ModelKind, Network, OutputKind, Word2Vec};

#[derive(Parser)]
#[command(name = "03_model_architecture", about = "Inspect model sizes and shapes")]
struct Args {
    /// Print the full ResNet-50 and VGG-16 tables
    #[arg(long)]
    full: bool,

    /// Vocabulary size for the word2vec comparison
    #[arg(long, default_value_t = 10_000)]
    vocab: usize,

    /// Embedding width for the word2vec comparison
    #[arg(long, default_value_t = 100)]
    unit: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skipgram=info")),
        )
        .init();

    let args = Args::parse();

    println!("=== word2vec ===");
    let counts = vec![1; args.vocab];
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let model = Word2Vec::new(
        args.vocab,
        args.unit,
        ModelKind::SkipGram,
        OutputKind::NegativeSampling { samples: 5 },
        &counts,
        &mut rng,
    )?;
    println!("  Vocabulary {} × width {}", model.vocab_size(), model.dim());
    println!("  Parameters: {}\n", model.count_parameters());

    println!("=== LeNet-5 ===");
    print!("{}", Network::lenet5().summary()?);

    for net in [Network::vgg16(1000), Network::resnet50(1000)] {
        println!("\n=== {} ===", net.name);
        if args.full {
            print!("{}", net.summary()?);
        } else {
            println!("  Input:      {}", net.input);
            println!("  Output:     {}", net.output_shape()?);
            println!("  Layers:     {}", net.layers.len());
            println!("  Parameters: {}", net.count_parameters());
        }
    }
    Ok(())
}
