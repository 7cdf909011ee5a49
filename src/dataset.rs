//! Corpus Loading
//!
//! A [`Corpus`] bundles a vocabulary with the tokenized train, validation and
//! test splits. The vocabulary is always built from the training split only, so
//! validation words never leak into the id space; unseen words in the other
//! splits become `<unk>`.
//!
//! ## Example
//!
//! ```rust
//! use skipgram::Corpus;
//!
//! let corpus = Corpus::from_texts(
//!     "the cat sat on the mat\nthe dog sat on the log",
//!     "the cat sat",
//!     "the bird sang",
//!     1,
//! );
//! assert_eq!(corpus.valid.len(), 4); // three words + <eos>
//! assert_eq!(corpus.test[1], 0);     // "bird" is unknown
//! ```

use crate::error::Result;
use crate::vocab::Vocabulary;
use std::fs;
use std::path::Path;

/// Tokenized dataset splits sharing one vocabulary
#[derive(Clone, Debug)]
pub struct Corpus {
    pub vocab: Vocabulary,
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
    pub test: Vec<usize>,
}

impl Corpus {
    /// Tokenize three splits, building the vocabulary on `train`
    pub fn from_texts(train: &str, valid: &str, test: &str, min_count: usize) -> Self {
        let vocab = Vocabulary::build(train, min_count);
        let corpus = Self {
            train: vocab.encode(train),
            valid: vocab.encode(valid),
            test: vocab.encode(test),
            vocab,
        };

        tracing::info!(
            train = corpus.train.len(),
            valid = corpus.valid.len(),
            test = corpus.test.len(),
            vocab = corpus.vocab.len(),
            "corpus loaded"
        );
        corpus
    }

    /// Read the three splits from files (for example `ptb.train.txt`,
    /// `ptb.valid.txt`, `ptb.test.txt`)
    pub fn from_files<P: AsRef<Path>>(train: P, valid: P, test: P, min_count: usize) -> Result<Self> {
        let train = fs::read_to_string(train)?;
        let valid = fs::read_to_string(valid)?;
        let test = fs::read_to_string(test)?;
        Ok(Self::from_texts(&train, &valid, &test, min_count))
    }

    /// Build a corpus from a single text, holding out the tail for validation
    ///
    /// The text is split on line boundaries: the last `val_fraction` of lines
    /// form the validation split. The test split is left empty.
    pub fn from_text_split(text: &str, val_fraction: f32, min_count: usize) -> Self {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let (train, valid) = train_val_split(&lines, val_fraction);
        Self::from_texts(&train.join("\n"), &valid.join("\n"), "", min_count)
    }

    /// Read one file and split it with [`Corpus::from_text_split`]
    pub fn from_file_split<P: AsRef<Path>>(path: P, val_fraction: f32, min_count: usize) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_text_split(&text, val_fraction, min_count))
    }

    /// Number of distinct ids (max id + 1)
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

/// Split a sequence into training and validation parts
///
/// The validation part is taken from the end so that sequential data keeps its
/// temporal order.
///
/// # Example
///
/// ```rust
/// # use skipgram::train_val_split;
/// let tokens = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
/// let (train, val) = train_val_split(&tokens, 0.2);
/// assert_eq!(train.len(), 8);
/// assert_eq!(val.len(), 2);
/// ```
pub fn train_val_split<T>(items: &[T], val_fraction: f32) -> (&[T], &[T]) {
    let val_fraction = val_fraction.clamp(0.0, 1.0);
    let split_idx = ((items.len() as f32) * (1.0 - val_fraction)).round() as usize;
    items.split_at(split_idx.min(items.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_comes_from_train_only() {
        let corpus = Corpus::from_texts("a b c\na b", "a z", "", 1);
        assert_eq!(corpus.vocab.id("z"), None);
        assert_eq!(corpus.valid, vec![corpus.vocab.id("a").unwrap(), 0, 1]);
        assert!(corpus.test.is_empty());
    }

    #[test]
    fn test_vocab_size_covers_every_id() {
        let corpus = Corpus::from_texts("x y z\nx y", "z z", "q", 1);
        let max_id = corpus
            .train
            .iter()
            .chain(&corpus.valid)
            .chain(&corpus.test)
            .max()
            .copied()
            .unwrap();
        assert_eq!(corpus.vocab_size(), max_id + 1);
    }

    #[test]
    fn test_text_split_holds_out_tail() {
        let text = (0..10).map(|i| format!("w{}", i)).collect::<Vec<_>>().join("\n");
        let corpus = Corpus::from_text_split(&text, 0.2, 1);

        // 8 lines of one word + <eos>, 2 lines held out
        assert_eq!(corpus.train.len(), 16);
        assert_eq!(corpus.valid.len(), 4);
        // held-out words never entered the vocabulary
        assert_eq!(corpus.valid[0], 0);
    }

    #[test]
    fn test_train_val_split_bounds() {
        let items = [1, 2, 3];
        assert_eq!(train_val_split(&items, 0.0).1.len(), 0);
        assert_eq!(train_val_split(&items, 1.0).0.len(), 0);
        assert_eq!(train_val_split(&items, 7.0).0.len(), 0);
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.txt");
        let valid = dir.path().join("valid.txt");
        let test = dir.path().join("test.txt");
        fs::write(&train, "one two\ntwo three\n").unwrap();
        fs::write(&valid, "two\n").unwrap();
        fs::write(&test, "four\n").unwrap();

        let corpus = Corpus::from_files(&train, &valid, &test, 1).unwrap();
        assert_eq!(corpus.train.len(), 6);
        assert_eq!(corpus.vocab.decode(&corpus.valid), "two\n");
        assert_eq!(corpus.vocab.decode(&corpus.test), "<unk>\n");
    }
}
