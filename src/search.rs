//! Similarity Search
//!
//! Trained input embeddings are the useful output of word2vec. This module
//! exports them in the plain-text word2vec format and answers nearest-neighbour
//! queries by cosine similarity.
//!
//! ## File Format
//!
//! ```text
//! 10000 100               vocabulary size, embedding width
//! the 0.0132 -0.4410 ...  one word and its vector per line
//! <unk> 0.2214 0.0871 ...
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use skipgram::Embeddings;
//!
//! let embeddings = Embeddings::load_word2vec_format("result/word2vec.model")?;
//! for (word, similarity) in embeddings.most_similar("monday", 5)? {
//!     println!("{word}: {similarity:.4}");
//! }
//! # Ok::<(), skipgram::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::model::Word2Vec;
use crate::tensor::{dot, norm, Tensor};
use crate::vocab::Vocabulary;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the model's input embeddings in word2vec text format
pub fn save_word2vec_format<P: AsRef<Path>>(path: P, vocab: &Vocabulary, model: &Word2Vec) -> Result<()> {
    if vocab.len() != model.vocab_size() {
        return Err(Error::ShapeMismatch {
            layer: "word2vec export".into(),
            expected: format!("{} words", model.vocab_size()),
            got: format!("{} words", vocab.len()),
        });
    }

    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{} {}", model.vocab_size(), model.dim())?;
    for (id, word) in vocab.words().iter().enumerate() {
        write!(file, "{}", word)?;
        for value in model.embedding(id) {
            write!(file, " {}", value)?;
        }
        writeln!(file)?;
    }
    file.flush()?;

    tracing::info!(path = %path.display(), words = vocab.len(), "word vectors exported");
    Ok(())
}

/// Word vectors ready for similarity queries
///
/// Vectors are stored L2-normalised, so a dot product is a cosine similarity.
pub struct Embeddings {
    words: Vec<String>,
    vectors: Tensor,
    index: HashMap<String, usize>,
}

impl Embeddings {
    /// Build from a word list and a `[words, dim]` matrix
    pub fn new(words: Vec<String>, vectors: Tensor) -> Result<Self> {
        if vectors.shape.len() != 2 || vectors.rows() != words.len() {
            return Err(Error::ShapeMismatch {
                layer: "embeddings".into(),
                expected: format!("[{}, dim]", words.len()),
                got: format!("{:?}", vectors.shape),
            });
        }

        let mut vectors = vectors;
        let dim = vectors.cols();
        if dim > 0 {
            vectors.data.par_chunks_mut(dim).for_each(|row| {
                let n = norm(row);
                if n > 0.0 {
                    row.iter_mut().for_each(|v| *v /= n);
                }
            });
        }

        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Ok(Self {
            words,
            vectors,
            index,
        })
    }

    /// Take the input embeddings of a trained model
    pub fn from_model(vocab: &Vocabulary, model: &Word2Vec) -> Result<Self> {
        Self::new(vocab.words().to_vec(), model.embed.clone())
    }

    /// Read a file written by [`save_word2vec_format`]
    pub fn load_word2vec_format<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| Error::InvalidParameter("empty word2vec file".into()))?;
        let mut fields = header.split_whitespace().map(str::parse::<usize>);
        let (count, dim) = match (fields.next(), fields.next(), fields.next()) {
            (Some(Ok(count)), Some(Ok(dim)), None) => (count, dim),
            _ => {
                return Err(Error::InvalidParameter(format!(
                    "bad word2vec header {:?}",
                    header
                )))
            }
        };

        if count.checked_mul(dim).is_none() {
            return Err(Error::InvalidParameter(format!(
                "word2vec header {:?} describes too many values",
                header
            )));
        }

        // Grow with the file rather than trusting the header's size
        let mut words = Vec::new();
        let mut data = Vec::new();
        for (n, line) in lines.enumerate() {
            let mut fields = line.split_whitespace();
            let word = fields.next().unwrap_or_default();
            let before = data.len();
            for field in fields {
                let value = field.parse::<f32>().map_err(|_| {
                    Error::InvalidParameter(format!("line {}: bad value {:?}", n + 2, field))
                })?;
                data.push(value);
            }
            if data.len() - before != dim {
                return Err(Error::ShapeMismatch {
                    layer: format!("word2vec line {}", n + 2),
                    expected: format!("{} values", dim),
                    got: format!("{} values", data.len() - before),
                });
            }
            words.push(word.to_string());
        }
        if words.len() != count {
            return Err(Error::ShapeMismatch {
                layer: "word2vec file".into(),
                expected: format!("{} words", count),
                got: format!("{} words", words.len()),
            });
        }

        tracing::debug!(words = count, dim, "word vectors loaded");
        Self::new(words, Tensor::new(data, vec![count, dim]))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.cols()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    /// Normalised vector of `word`
    pub fn vector(&self, word: &str) -> Option<&[f32]> {
        self.index.get(word).map(|&i| self.vectors.row(i))
    }

    /// The `k` words closest to `word` by cosine similarity
    ///
    /// The query word itself is never returned. Results are sorted from most
    /// to least similar.
    pub fn most_similar(&self, word: &str, k: usize) -> Result<Vec<(String, f32)>> {
        let &query_id = self
            .index
            .get(word)
            .ok_or_else(|| Error::UnknownWord(word.to_string()))?;
        let query = self.vectors.row(query_id);

        let mut scored: Vec<(usize, f32)> = (0..self.words.len())
            .into_par_iter()
            .filter(|&i| i != query_id)
            .map(|i| (i, dot(query, self.vectors.row(i))))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, sim)| (self.words[i].clone(), sim))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelKind, OutputKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn toy() -> Embeddings {
        let words = ["king", "queen", "apple", "pear"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        let vectors = Tensor::new(
            vec![
                1.0, 0.1, 0.0, //
                0.9, 0.2, 0.0, //
                0.0, 0.1, 1.0, //
                0.0, 0.3, 0.8,
            ],
            vec![4, 3],
        );
        Embeddings::new(words, vectors).unwrap()
    }

    #[test]
    fn test_most_similar_ranks_by_cosine() {
        let result = toy().most_similar("king", 3).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].0, "queen");
        assert!(result[0].1 > 0.9);
        assert!(result[0].1 > result[1].1 && result[1].1 >= result[2].1);
        assert!(result.iter().all(|(w, _)| w != "king"));
    }

    #[test]
    fn test_most_similar_caps_at_vocabulary() {
        assert_eq!(toy().most_similar("apple", 10).unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_word() {
        assert!(matches!(
            toy().most_similar("banana", 3),
            Err(Error::UnknownWord(w)) if w == "banana"
        ));
    }

    #[test]
    fn test_vectors_are_normalised() {
        let e = toy();
        assert!((norm(e.vector("pear").unwrap()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_export_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("word2vec.model");

        let vocab = Vocabulary::build("a b c a b a", 1);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let model = Word2Vec::new(vocab.len(), 5, ModelKind::SkipGram, OutputKind::Softmax, vocab.counts(), &mut rng)
            .unwrap();
        save_word2vec_format(&path, &vocab, &model).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next().unwrap(), format!("{} 5", vocab.len()));

        let loaded = Embeddings::load_word2vec_format(&path).unwrap();
        let direct = Embeddings::from_model(&vocab, &model).unwrap();
        assert_eq!(loaded.len(), vocab.len());
        assert_eq!(loaded.dim(), 5);
        for word in vocab.words() {
            let (a, b) = (loaded.vector(word).unwrap(), direct.vector(word).unwrap());
            assert!(a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6));
        }
    }

    #[test]
    fn test_load_rejects_overflowing_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.model");
        fs::write(&path, format!("{} {}\nfoo 1 2\n", usize::MAX, 2)).unwrap();
        assert!(matches!(
            Embeddings::load_word2vec_format(&path),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_load_rejects_missing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.model");
        fs::write(&path, "1000000 2\nfoo 1 2\n").unwrap();
        assert!(matches!(
            Embeddings::load_word2vec_format(&path),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.model");
        fs::write(&path, "2 3\nfoo 1 2 3\nbar 1 2\n").unwrap();
        assert!(matches!(
            Embeddings::load_word2vec_format(&path),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
