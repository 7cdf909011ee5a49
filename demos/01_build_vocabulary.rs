//! Build a Word Vocabulary
//!
//! Reads a corpus, builds the word-level vocabulary used by every later step,
//! and shows how text maps to token ids and back.
//!
//! ## What You'll Learn
//!
//! - How words are counted and ordered (most frequent first)
//! - What `<unk>` and `<eos>` are for
//! - How `min_count` trades vocabulary size for unknown tokens
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example 01_build_vocabulary -- --data ptb.train.txt
//! cargo run --release --example 01_build_vocabulary -- --data ptb.train.txt --min-count 5 --save vocab.json
//! ```
//!
//! ## Prerequisites
//!
//! The Penn Treebank splits used by the classic word2vec example:
//! ```bash
//! curl -O https://raw.githubusercontent.com/wojzaremba/lstm/master/data/ptb.train.txt
//! ```

use anyhow::Context;
use clap::Parser;
use skipgram::Vocabulary;
use std::fs;

#[derive(Parser)]
#[command(name = "01_build_vocabulary", about = "Build and inspect a word vocabulary")]
struct Args {
    /// Training text, one sentence per line
    #[arg(long, default_value = "ptb.train.txt")]
    data: String,

    /// Words seen fewer times become <unk>
    #[arg(long, default_value_t = 1)]
    min_count: usize,

    /// Number of most frequent words to print
    #[arg(long, default_value_t = 20)]
    top: usize,

    /// Write the vocabulary as JSON
    #[arg(long)]
    save: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skipgram=info")),
        )
        .init();

    let args = Args::parse();
    let text = fs::read_to_string(&args.data).with_context(|| format!("reading {}", args.data))?;

    println!("=== Building Vocabulary ===");
    let vocab = Vocabulary::build(&text, args.min_count);
    let stats = vocab.stats();
    println!("  Vocabulary size: {}", stats.vocab_size);
    println!("  Total tokens:    {}", stats.total_tokens);
    println!(
        "  Unknown tokens:  {} ({:.2}%)",
        stats.unknown_tokens,
        100.0 * stats.unknown_tokens as f64 / stats.total_tokens.max(1) as f64
    );
    println!("  Singletons:      {}", stats.singletons);

    println!("\n=== Most Frequent Words ===");
    for (id, (word, count)) in vocab.words().iter().zip(vocab.counts()).enumerate().take(args.top) {
        println!("  {:5} {:<15} {:>8}", id, word, count);
    }

    println!("\n=== Encoding ===");
    if let Some(line) = text.lines().find(|l| !l.trim().is_empty()) {
        let ids = vocab.encode(line);
        println!("  Text:    {}", line.trim());
        println!("  Ids:     {:?}", ids);
        println!("  Decoded: {}", vocab.decode(&ids).trim_end());
    }

    if let Some(path) = args.save {
        vocab.save(&path)?;
        println!("\n✓ Vocabulary saved to: {}", path);
    }
    Ok(())
}
