//! Nearest-Neighbour Search
//!
//! Loads vectors exported by `04_train_word2vec` and answers "which words are
//! most similar to X?" by cosine similarity.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example 05_search -- --model result/word2vec.model
//! cargo run --release --example 05_search -- --model result/word2vec.model --query monday --query stock
//! ```
//!
//! Without `--query` words are read from standard input, one per line.

use anyhow::Context;
use clap::Parser;
use skipgram::{Embeddings, Error};
use std::io::{self, BufRead, Write};

#[derive(Parser)]
#[command(name = "05_search", about = "Find similar words in trained embeddings")]
struct Args {
    /// File written by 04_train_word2vec
    #[arg(long, default_value = "result/word2vec.model")]
    model: String,

    /// Neighbours to show per query
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Words to look up (reads stdin when omitted)
    #[arg(long)]
    query: Vec<String>,
}

fn show(embeddings: &Embeddings, word: &str, top: usize) -> anyhow::Result<()> {
    match embeddings.most_similar(word, top) {
        Ok(neighbours) => {
            println!("query: {}", word);
            for (other, similarity) in neighbours {
                println!("  {:<15} {:.4}", other, similarity);
            }
        }
        Err(Error::UnknownWord(w)) => println!("{:?} is not in the vocabulary", w),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skipgram=info")),
        )
        .init();

    let args = Args::parse();
    let embeddings = Embeddings::load_word2vec_format(&args.model)
        .with_context(|| format!("loading {}", args.model))?;
    println!("Loaded {} words of width {}", embeddings.len(), embeddings.dim());

    if !args.query.is_empty() {
        for word in &args.query {
            show(&embeddings, word, args.top)?;
        }
        return Ok(());
    }

    let stdin = io::stdin();
    loop {
        print!(">> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let word = line.trim();
        if word.is_empty() {
            continue;
        }
        show(&embeddings, word, args.top)?;
    }
    Ok(())
}
