//! Windowed Context Sampling
//!
//! Walks through how the window iterator turns a token sequence into
//! (center, context) batches for word2vec.
//!
//! ## What You'll Learn
//!
//! - Which positions can be centers (those with a full window on both sides)
//! - How the radius is drawn per batch and bounded by the window
//! - What an epoch is, and how `epoch_detail` tracks progress through one
//! - How repeating and single-pass iteration differ
//! - How sampler state is saved and restored
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --example 02_window_iterator
//! ```

use skipgram::{Vocabulary, WindowIterator};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skipgram=info")),
        )
        .init();

    let text = "the quick brown fox jumps over the lazy dog";
    let vocab = Vocabulary::build(text, 1);
    let tokens = vocab.encode(text);
    println!("=== Corpus ===");
    println!("  Tokens: {:?}", tokens);
    println!("  Length: {}\n", tokens.len());

    println!("=== Single Pass (window 2, batch 3) ===");
    let mut iter = WindowIterator::new(&tokens, 2, 3, false, 0)?;
    println!(
        "  {} centers, {} batches per epoch",
        iter.positions_per_epoch(),
        iter.batches_per_epoch()
    );
    while let Some(batch) = iter.next_batch() {
        println!(
            "  radius {} | epoch_detail {:.3} | new epoch: {}",
            batch.radius,
            iter.epoch_detail(),
            iter.is_new_epoch()
        );
        for ((&pos, &center), context) in batch.positions.iter().zip(&batch.centers).zip(&batch.contexts) {
            let words: Vec<&str> = context.iter().filter_map(|&id| vocab.word(id)).collect();
            println!(
                "    position {:2}: {:<6} ← {:?}",
                pos,
                vocab.word(center).unwrap_or("?"),
                words
            );
        }
    }
    println!("  Exhausted after epoch {}\n", iter.epoch());

    println!("=== Repeating Iteration ===");
    let mut iter = WindowIterator::new(&tokens, 2, 2, true, 7)?;
    for _ in 0..8 {
        if let Some(batch) = iter.next_batch() {
            println!(
                "  centers {:?} | epoch {} | epoch_detail {:.2}",
                batch.positions,
                iter.epoch(),
                iter.epoch_detail()
            );
        }
    }

    println!("\n=== Save and Restore ===");
    let state = iter.state();
    println!("  Saved state: {}", serde_json::to_string(&state)?);
    let expected = iter.next_batch();
    let mut restored = WindowIterator::new(&tokens, 2, 2, true, 7)?;
    restored.restore(state)?;
    let resumed = restored.next_batch();
    println!("  Resumed batch matches: {}", expected == resumed);

    Ok(())
}
