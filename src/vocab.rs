//! Word-Level Vocabulary
//!
//! Word embeddings are learned per word, so unlike subword tokenizers the
//! vocabulary here is simply the set of distinct words in the training text,
//! each mapped to an integer id.
//!
//! ## Conventions
//!
//! The vocabulary follows the Penn Treebank layout used by classic word2vec
//! experiments:
//!
//! - Text is split on whitespace, line by line
//! - An end-of-sentence marker `<eos>` is appended after every non-empty line
//! - Words seen fewer than `min_count` times collapse into `<unk>`
//!
//! ```text
//! "the cat sat\nthe dog"  →  the cat sat <eos> the dog <eos>
//! ```
//!
//! ## Id Assignment
//!
//! - id 0: `<unk>`
//! - id 1: `<eos>`
//! - ids 2..: remaining words by descending frequency (ties broken alphabetically)
//!
//! Frequent words get small ids, and the per-id counts are kept because the
//! negative sampler draws words in proportion to `count^0.75`.
//!
//! ## Example
//!
//! ```rust
//! use skipgram::Vocabulary;
//!
//! let vocab = Vocabulary::build("the cat sat\nthe dog sat", 1);
//! let ids = vocab.encode("the dog");
//! assert_eq!(vocab.decode(&ids), "the dog\n");
//! assert_eq!(vocab.id("zebra"), None);
//! ```

use crate::error::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Unknown word marker (always id 0)
pub const UNK: &str = "<unk>";
/// End-of-sentence marker (always id 1)
pub const EOS: &str = "<eos>";

/// Mapping between words and integer ids, with training-set frequencies
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "VocabularyData", into = "VocabularyData")]
pub struct Vocabulary {
    words: Vec<String>,
    counts: Vec<usize>,
    min_count: usize,
    index: HashMap<String, usize>,
}

/// On-disk form: the index is rebuilt on load
#[derive(Clone, Serialize, Deserialize)]
struct VocabularyData {
    words: Vec<String>,
    counts: Vec<usize>,
    min_count: usize,
}

impl From<VocabularyData> for Vocabulary {
    fn from(data: VocabularyData) -> Self {
        let index = data
            .words
            .iter()
            .enumerate()
            .map(|(id, w)| (w.clone(), id))
            .collect();
        Self {
            words: data.words,
            counts: data.counts,
            min_count: data.min_count,
            index,
        }
    }
}

impl From<Vocabulary> for VocabularyData {
    fn from(vocab: Vocabulary) -> Self {
        Self {
            words: vocab.words,
            counts: vocab.counts,
            min_count: vocab.min_count,
        }
    }
}

impl Vocabulary {
    /// Build a vocabulary from training text
    ///
    /// # Arguments
    ///
    /// * `text` - Training text, one sentence per line
    /// * `min_count` - Words seen fewer times than this become `<unk>`
    ///   (0 and 1 both keep every word)
    pub fn build(text: &str, min_count: usize) -> Self {
        // Count words per line in parallel, then merge the partial maps
        let word_counts: HashMap<&str, usize> = text
            .par_lines()
            .fold(HashMap::new, |mut acc, line| {
                for word in line.split_whitespace() {
                    *acc.entry(word).or_insert(0) += 1;
                }
                acc
            })
            .reduce(HashMap::new, |mut a, b| {
                for (word, count) in b {
                    *a.entry(word).or_insert(0) += count;
                }
                a
            });

        let sentences = text.lines().filter(|l| !l.trim().is_empty()).count();

        let mut unk_count = word_counts.get(UNK).copied().unwrap_or(0);
        let mut kept: Vec<(&str, usize)> = Vec::new();
        for (&word, &count) in &word_counts {
            if word == UNK || word == EOS {
                continue;
            }
            if count < min_count {
                unk_count += count;
            } else {
                kept.push((word, count));
            }
        }
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut words = vec![UNK.to_string(), EOS.to_string()];
        let mut counts = vec![unk_count, sentences + word_counts.get(EOS).copied().unwrap_or(0)];
        for (word, count) in kept {
            words.push(word.to_string());
            counts.push(count);
        }

        tracing::info!(
            words = words.len(),
            unknown = unk_count,
            min_count,
            "vocabulary built"
        );

        VocabularyData {
            words,
            counts,
            min_count,
        }
        .into()
    }

    /// Convert text to token ids
    ///
    /// Each non-empty line yields its words followed by `<eos>`. Words outside
    /// the vocabulary map to `<unk>`.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        let mut ids = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            ids.extend(
                line.split_whitespace()
                    .map(|w| self.index.get(w).copied().unwrap_or(0)),
            );
            ids.push(1);
        }
        ids
    }

    /// Convert token ids back to text
    ///
    /// `<eos>` becomes a newline; other words are separated by single spaces.
    /// Ids outside the vocabulary render as `<unk>`.
    pub fn decode(&self, ids: &[usize]) -> String {
        let mut out = String::new();
        let mut line_start = true;
        for &id in ids {
            if id == 1 {
                out.push('\n');
                line_start = true;
                continue;
            }
            if !line_start {
                out.push(' ');
            }
            out.push_str(self.word(id).unwrap_or(UNK));
            line_start = false;
        }
        out
    }

    /// Id of a word, if it is in the vocabulary
    pub fn id(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Word for an id, if the id is in range
    pub fn word(&self, id: usize) -> Option<&str> {
        self.words.get(id).map(String::as_str)
    }

    /// Number of words, including `<unk>` and `<eos>`
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Training-set frequency of each id
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Save the vocabulary as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a vocabulary saved with [`Vocabulary::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Get statistics about the vocabulary
    pub fn stats(&self) -> VocabularyStats {
        let total_tokens: usize = self.counts.iter().sum();
        VocabularyStats {
            vocab_size: self.words.len(),
            total_tokens,
            unknown_tokens: self.counts[0],
            singletons: self.counts.iter().skip(2).filter(|&&c| c == 1).count(),
            min_count: self.min_count,
        }
    }
}

/// Statistics about a vocabulary
#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyStats {
    /// Number of distinct ids
    pub vocab_size: usize,
    /// Tokens in the training text, `<eos>` included
    pub total_tokens: usize,
    /// Training tokens that collapsed into `<unk>`
    pub unknown_tokens: usize,
    /// Kept words seen exactly once
    pub singletons: usize,
    pub min_count: usize,
}
