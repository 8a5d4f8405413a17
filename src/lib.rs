//! A next-word-prediction and current-word-completion engine for assistive
//! text entry: tokenizes raw text, matches it against a word dictionary and
//! a static/dynamic n-gram language model, optionally proposes rule-driven
//! corrections, and scores the result into a ranked, editable candidate
//! list.
//!
//! The public surface is [`predictor::Predictor`]; everything else is
//! exposed for hosts that need to build dictionaries, train models, or
//! inspect the tries directly (tooling, offline corpus ingestion).

pub mod config;
pub mod correction;
pub mod dictionary;
pub mod error;
pub mod ngram;
pub mod predictor;
pub mod prefix_detector;
pub mod probability;
pub mod separator;
mod time;
pub mod tokenizer;

pub use config::PredictionConfig;
pub use dictionary::{Dictionary, Word, WordKind};
pub use error::{PredictError, Result};
pub use ngram::{DynamicTrie, NgramTrie, StaticTrie};
pub use predictor::{PredictionCandidate, PredictionResult, Predictor};
pub use separator::{EquivalenceClass, Separator, Tag};
pub use tokenizer::{Token, TokenKind, Tokenizer};
