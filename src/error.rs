//! Error kinds surfaced by this crate.
//!
//! Mirrors the four failure modes a predictor can hit: a user overlay that
//! was built against a different dictionary, a persisted file that is
//! truncated or malformed, an underlying I/O failure, and a programmer
//! error where a caller asks the dynamic trie to update probabilities for
//! a context it never recorded.

use std::path::PathBuf;

/// Errors produced by dictionary, trie, and predictor operations.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("user overlay identifier {found:?} does not match dictionary identifier {expected:?}")]
    DictionaryMismatch { expected: String, found: String },

    #[error("corrupt file {path:?}: {reason}")]
    CorruptFile { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid prefix: context {prefix:?} does not exist in the dynamic trie")]
    InvalidPrefix { prefix: Vec<u32> },
}

pub type Result<T> = std::result::Result<T, PredictError>;
