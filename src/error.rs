use std::io;
use thiserror::Error;

/// Errors raised by the training engine and the embedding table.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot read corpus {path}: {source}")]
    CorpusNotFound {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index {index} out of range for vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("division by zero at coordinate {index}")]
    DivisionByZero { index: usize },

    #[error("token '{0}' is not in the embedding table")]
    UnknownToken(String),

    #[error("vocabulary of size {0} is too small for negative sampling")]
    VocabularyTooSmall(usize),

    #[error("corrupt record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot build worker pool: {0}")]
    ThreadPool(String),
}

impl EmbeddingError {
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    pub fn corrupt(line: usize, reason: impl Into<String>) -> Self {
        Self::CorruptRecord { line, reason: reason.into() }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        Self::Io { path: path.as_ref().display().to_string(), source }
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
