//! Longest started-word prefix detection.
//!
//! Finds the longest suffix of the token stream whose concatenated surface
//! is the prefix of at least one dictionary word, then decides whether the
//! resulting candidate should be capitalised, via a token-boundary walk
//! over the dictionary's `prefix_search`.

use crate::dictionary::{Dictionary, Word};
use crate::tokenizer::{Token, TokenKind};
use std::collections::HashSet;

const MAX_LOOKBACK_TOKENS: usize = 5;

#[derive(Debug, Clone)]
pub struct StartedPrefix {
    /// Number of trailing tokens consumed to form the prefix.
    pub token_count: usize,
    /// Concatenated surface form of the consumed tokens.
    pub text: String,
    /// Dictionary ids whose surface begins with `text`.
    pub candidate_ids: Vec<u32>,
    pub is_capitalized: bool,
}

/// True when either the token list is empty, or every token after the last
/// sentence-terminating separator (or, if there is none, every token in the
/// list) is itself a separator.
pub fn sentence_just_started(tokens: &[Token]) -> bool {
    let last_term = tokens.iter().rposition(|t| {
        matches!(&t.kind, TokenKind::Separator(s) if s.is_sentence_terminating())
    });
    let after = match last_term {
        Some(idx) => &tokens[idx + 1..],
        None => tokens,
    };
    after.iter().all(|t| matches!(t.kind, TokenKind::Separator(_)))
}

fn is_capitalized(text: &str) -> bool {
    text.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Finds the longest started-word prefix and its dictionary candidates (not
/// including rule-based corrections — the predictor merges those in
/// separately, since only the caller knows whether corrections are
/// enabled and only the last token was consumed).
pub fn detect_started_prefix(
    dictionary: &Dictionary,
    tokens: &[Token],
    predicate: &dyn Fn(&Word) -> bool,
    limit: usize,
) -> Option<StartedPrefix> {
    if tokens.is_empty() {
        return None;
    }
    if matches!(tokens.last().unwrap().kind, TokenKind::Separator(_)) {
        return None;
    }

    let mut best: Option<StartedPrefix> = None;
    let max_extend = MAX_LOOKBACK_TOKENS.min(tokens.len());

    for step in 1..=max_extend {
        let tok = &tokens[tokens.len() - step];
        if step > 1 {
            if let TokenKind::Separator(sep) = &tok.kind {
                if !sep.is_apostrophe_class() {
                    break;
                }
            }
        }

        let window = &tokens[tokens.len() - step..];
        let surface: String = window.iter().map(|t| t.normalized.as_str()).collect();
        let ids = dictionary.prefix_search(&surface, |w| predicate(w), limit, &HashSet::new());
        if !ids.is_empty() {
            best = Some(StartedPrefix {
                token_count: step,
                is_capitalized: is_capitalized(&surface),
                text: surface,
                candidate_ids: ids,
            });
        }
    }

    if best.is_some() {
        return best;
    }

    // No accepted candidate at any length: if the trailing token is a word,
    // report it as the prefix with an empty candidate set.
    let last = tokens.last().unwrap();
    if last.is_word_like() {
        return Some(StartedPrefix {
            token_count: 1,
            is_capitalized: is_capitalized(&last.normalized),
            text: last.normalized.clone(),
            candidate_ids: Vec::new(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn dict_with(words: &[&str]) -> Dictionary {
        let mut dict = Dictionary::new("test");
        for w in words {
            dict.insert_simple_word(w);
        }
        dict
    }

    #[test]
    fn finds_partial_word_prefix() {
        let dict = dict_with(&["remercie", "rappelle"]);
        let tokens = Tokenizer::new().tokenize("je te r");
        let prefix = detect_started_prefix(&dict, &tokens, &|_| true, 10).unwrap();
        assert_eq!(prefix.text, "r");
        assert_eq!(prefix.token_count, 1);
        assert_eq!(prefix.candidate_ids.len(), 2);
    }

    #[test]
    fn trailing_separator_means_no_started_prefix() {
        let dict = dict_with(&["manger"]);
        let tokens = Tokenizer::new().tokenize("je mange ");
        assert!(detect_started_prefix(&dict, &tokens, &|_| true, 10).is_none());
    }

    #[test]
    fn sentence_start_after_period_and_space() {
        let tokens = Tokenizer::new().tokenize("Bonjour. ");
        assert!(sentence_just_started(&tokens));
    }

    #[test]
    fn mid_sentence_is_not_a_new_sentence() {
        let tokens = Tokenizer::new().tokenize("bonjour, comment");
        assert!(!sentence_just_started(&tokens));
    }

    #[test]
    fn empty_input_counts_as_sentence_start() {
        assert!(sentence_just_started(&[]));
    }
}
