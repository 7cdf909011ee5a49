//! Error types for skipgram

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Corpus of {len} tokens is too short for window {window}")]
    CorpusTooShort { len: usize, window: usize },

    #[error("Unknown word: {0:?}")]
    UnknownWord(String),

    #[error("Shape mismatch in {layer}: expected {expected}, got {got}")]
    ShapeMismatch {
        layer: String,
        expected: String,
        got: String,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
