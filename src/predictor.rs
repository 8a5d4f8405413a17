//! The stateless-between-calls `Predictor`: composes the dictionary, both
//! n-gram tries, the prefix detector, and the correction engine into
//! `predict`/`train`/`dispose`.
//!
//! The pipeline segments the input, generates candidates, merges them by
//! best score, then ranks and truncates. An optional `lru::LruCache` caches
//! recent results, keyed on the same inputs `predict` takes.

use crate::config::PredictionConfig;
use crate::correction::{self, AtomicRule};
use crate::dictionary::{Dictionary, Word, WordKind};
use crate::error::Result;
use crate::ngram::{DynamicTrie, NgramTrie, StaticTrie};
use crate::prefix_detector;
use crate::probability;
use crate::separator::{Separator, Tag};
use crate::tokenizer::{Token, TokenKind, Tokenizer};
use std::cell::RefCell;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use lru::LruCache;

const MAX_INPUT_CHARS: usize = 70;
const CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionCandidate {
    pub surface: String,
    pub prediction_to_insert: String,
    pub previous_char_count_to_remove: usize,
    pub may_insert_space: bool,
    pub score: f64,
    pub is_correction: bool,
    pub word_id: u32,
    pub debug_trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionResult {
    pub candidates: Vec<PredictionCandidate>,
    pub next_char_count_to_remove: usize,
}

struct ScoredCandidate {
    word_id: u32,
    surface: String,
    raw_score: f64,
    is_correction: bool,
    correction_left_part: Option<String>,
}

pub struct Predictor {
    dictionary: Dictionary,
    static_trie: Option<StaticTrie>,
    dynamic_trie: DynamicTrie,
    config: PredictionConfig,
    rules: Vec<AtomicRule>,
    sentence_start_id: u32,
    tokenizer: Tokenizer,
    cache: RefCell<LruCache<String, PredictionResult>>,
}

impl Predictor {
    pub fn new(dictionary: Dictionary, static_trie: Option<StaticTrie>, config: PredictionConfig) -> Self {
        let max_order = config.max_order;
        let rules = correction::flatten(
            &config.correction_rules_root,
            config.correction_default_cost,
            config.correction_default_factor,
        );
        Self {
            sentence_start_id: Tag::SentenceStart.dictionary_id(),
            dynamic_trie: DynamicTrie::new(max_order),
            static_trie,
            rules,
            config,
            dictionary,
            tokenizer: Tokenizer::new(),
            cache: RefCell::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    fn word_is_valid(&self, word: &Word) -> bool {
        if word.header.force_invalid {
            return false;
        }
        if word.header.force_valid {
            return true;
        }
        match &word.kind {
            WordKind::User { usage_count, .. } => {
                *usage_count >= self.config.min_use_count_to_validate_new_word
            }
            _ => true,
        }
    }

    fn trim_to_last_chars(text: &str, max_chars: usize) -> &str {
        let char_count = text.chars().count();
        if char_count <= max_chars {
            return text;
        }
        let skip = char_count - max_chars;
        let byte_offset = text
            .char_indices()
            .nth(skip)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        &text[byte_offset..]
    }

    /// Left-padded, right-truncated integer context of length
    /// `max_order - 1` ending just before `upto` (exclusive), built from the
    /// word-like tokens in `tokens[..upto]`.
    fn build_context(&mut self, tokens: &[Token], upto: usize, learn_new_words: bool) -> Vec<u32> {
        let width = self.config.max_order.saturating_sub(1);
        let mut ids: Vec<u32> = tokens[..upto]
            .iter()
            .filter(|t| t.is_word_like())
            .map(|t| self.resolve_id(&t.normalized, learn_new_words))
            .collect();
        if ids.len() > width {
            let drop = ids.len() - width;
            ids.drain(0..drop);
        }
        let pad = width.saturating_sub(ids.len());
        let mut context = vec![self.sentence_start_id; pad];
        context.extend(ids.drain(..));
        context
    }

    fn resolve_id(&mut self, surface: &str, learn_new_words: bool) -> u32 {
        let id = self.dictionary.id_for(surface);
        if id == Tag::Unknown.dictionary_id() && learn_new_words && self.config.add_new_words {
            self.dictionary.put_user_word(surface)
        } else {
            id
        }
    }

    fn list_next_words_merged(&self, context: &[u32], limit: usize, exclude: &[u32]) -> Vec<u32> {
        let mut seen: HashSet<u32> = exclude.iter().copied().collect();
        let mut out = Vec::new();
        if let Some(static_trie) = &self.static_trie {
            for (id, _) in static_trie.list_next_words(context, limit, exclude) {
                if seen.insert(id) {
                    out.push(id);
                }
            }
        }
        for (id, _) in self.dynamic_trie.list_next_words(context, limit, exclude) {
            if seen.insert(id) {
                out.push(id);
            }
        }
        out.truncate(limit);
        out
    }

    /// Converts generated corrections into scored candidates.
    fn corrections_to_candidates(
        &self,
        corrections: &std::collections::HashMap<String, correction::CorrectedCandidate>,
        exclude: &HashSet<u32>,
        limit: usize,
    ) -> Vec<ScoredCandidate> {
        let mut out = Vec::new();
        for candidate in corrections.values() {
            match candidate.parts.as_slice() {
                [single] => {
                    let ids = self.dictionary.prefix_search(
                        single,
                        |w| self.word_is_valid(w),
                        limit,
                        exclude,
                    );
                    for id in ids {
                        if let Some(word) = self.dictionary.word(id) {
                            out.push(ScoredCandidate {
                                word_id: id,
                                surface: word.surface().to_string(),
                                raw_score: candidate.factor,
                                is_correction: true,
                                correction_left_part: None,
                            });
                        }
                    }
                }
                [left, right] => {
                    let left_id = self.dictionary.id_for(left);
                    if left_id == Tag::Unknown.dictionary_id() {
                        continue;
                    }
                    let right_ids = self.dictionary.prefix_search(
                        right,
                        |w| self.word_is_valid(w),
                        limit,
                        exclude,
                    );
                    for right_id in right_ids {
                        if self
                            .static_trie
                            .as_ref()
                            .map(|t| t.node_for(&[left_id, right_id]).ok().flatten().is_some())
                            .unwrap_or(false)
                            || self.dynamic_trie.node_for(&[left_id, right_id]).is_some()
                        {
                            if let Some(word) = self.dictionary.word(right_id) {
                                out.push(ScoredCandidate {
                                    word_id: right_id,
                                    surface: word.surface().to_string(),
                                    raw_score: candidate.factor,
                                    is_correction: true,
                                    correction_left_part: Some(left.clone()),
                                });
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Public prediction entry point.
    pub fn predict(
        &mut self,
        text_before: &str,
        text_after: Option<&str>,
        wanted_count: usize,
        exclude_ids: &[u32],
    ) -> PredictionResult {
        let span = tracing::span!(tracing::Level::DEBUG, "predict", wanted_count);
        let _enter = span.enter();

        let trimmed = Self::trim_to_last_chars(text_before, MAX_INPUT_CHARS);
        let cache_key = format!("{trimmed}\u{1}{text_after:?}\u{1}{wanted_count}\u{1}{exclude_ids:?}");
        if let Some(hit) = self.cache.borrow_mut().get(&cache_key) {
            tracing::debug!("cache hit");
            return hit.clone();
        }

        let tokens = self.tokenizer.tokenize(trimmed);
        let exclude: HashSet<u32> = exclude_ids.iter().copied().collect();

        let prefix = prefix_detector::detect_started_prefix(
            &self.dictionary,
            &tokens,
            &|w: &Word| self.word_is_valid(w),
            3 * wanted_count.max(1),
        );

        if let Some(p) = &prefix {
            if p.text.chars().count() < self.config.min_count_to_provide_prediction {
                return PredictionResult::default();
            }
        }

        let context_end = prefix.as_ref().map(|p| tokens.len() - p.token_count).unwrap_or(tokens.len());
        let add_new_words = self.config.add_new_words;
        let context = self.build_context(&tokens, context_end, add_new_words);

        let mut scored: Vec<ScoredCandidate> = Vec::new();

        if let Some(p) = &prefix {
            for &id in &p.candidate_ids {
                if exclude.contains(&id) {
                    continue;
                }
                if let Some(word) = self.dictionary.word(id) {
                    scored.push(ScoredCandidate {
                        word_id: id,
                        surface: word.surface().to_string(),
                        raw_score: 1.0,
                        is_correction: false,
                        correction_left_part: None,
                    });
                }
            }

            if self.config.enable_word_correction
                && self.config.correction_max_cost > 0.0
                && p.text.chars().count() >= self.config.min_count_to_provide_correction
            {
                let corrections = correction::generate_corrections(
                    &p.text,
                    &self.rules,
                    self.config.correction_max_cost,
                    &|candidate: &str| !self.dictionary.prefix_search(candidate, |_| true, 1, &HashSet::new()).is_empty(),
                    &|word: &str| {
                        let id = self.dictionary.id_for(word);
                        id != Tag::Unknown.dictionary_id()
                            && probability::probability_in_trie(&self.dynamic_trie, &[], id) > 1e-6
                    },
                );
                scored.extend(self.corrections_to_candidates(&corrections, &exclude, 3 * wanted_count.max(1)));
            }
        } else {
            let exclude_vec: Vec<u32> = exclude.iter().copied().collect();
            let ids = self.list_next_words_merged(&context, 3 * wanted_count.max(1), &exclude_vec);
            for id in ids {
                if let Some(word) = self.dictionary.word(id) {
                    scored.push(ScoredCandidate {
                        word_id: id,
                        surface: word.surface().to_string(),
                        raw_score: 1.0,
                        is_correction: false,
                        correction_left_part: None,
                    });
                }
            }

            // Apostrophe "double-word" compound expansion.
            let trailing_apostrophe = tokens.last().map_or(false, |t| {
                matches!(&t.kind, TokenKind::Separator(s) if s.is_apostrophe_class())
            });
            if trailing_apostrophe {
                if let Some(first) = scored.first() {
                    let first_id = first.word_id;
                    let first_surface = first.surface.clone();
                    let width = self.config.max_order.saturating_sub(1);
                    let mut shifted_context = context.clone();
                    shifted_context.push(first_id);
                    if shifted_context.len() > width {
                        let drop = shifted_context.len() - width;
                        shifted_context.drain(0..drop);
                    }
                    let seconds = self.list_next_words_merged(&shifted_context, 1, &[]);
                    if let Some(&second_id) = seconds.first() {
                        if let Some(word) = self.dictionary.word(second_id) {
                            let compound = format!("{first_surface}'{}", word.surface());
                            scored.push(ScoredCandidate {
                                word_id: second_id,
                                surface: compound,
                                raw_score: 1.0,
                                is_correction: false,
                                correction_left_part: None,
                            });
                        }
                    }
                }
            }
        }

        for candidate in &mut scored {
            let prob = probability::probability_interpolated(
                self.static_trie.as_ref(),
                if self.config.dynamic_model_enabled { Some(&self.dynamic_trie) } else { None },
                &context,
                candidate.word_id,
                self.config.dynamic_model_minimum_weight,
            );
            let prob_factor = self
                .dictionary
                .word(candidate.word_id)
                .map(|w| w.header.prob_factor as f64)
                .unwrap_or(1.0);
            candidate.raw_score *= prob * prob_factor;
        }

        let total_score: f64 = scored.iter().map(|c| c.raw_score).sum();
        scored.sort_by(|a, b| b.raw_score.partial_cmp(&a.raw_score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(wanted_count);

        let mut by_lower: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        let mut deduped: Vec<ScoredCandidate> = Vec::new();
        for candidate in scored {
            let key = candidate.surface.to_lowercase();
            match by_lower.get(&key) {
                Some(&idx) if deduped[idx].raw_score >= candidate.raw_score => {
                    if self.config.enable_debug_information {
                        tracing::warn!(surface = %key, "dropped lower-scoring duplicate after dedup");
                    }
                }
                Some(&idx) => deduped[idx] = candidate,
                None => {
                    by_lower.insert(key, deduped.len());
                    deduped.push(candidate);
                }
            }
        }

        let normalizer = if total_score > 0.0 { total_score } else { 1.0 };
        let started_text = prefix.as_ref().map(|p| p.text.as_str()).unwrap_or("");
        let started_is_capitalized = prefix.as_ref().map(|p| p.is_capitalized).unwrap_or(false);
        let new_sentence = prefix_detector::sentence_just_started(&tokens);

        let candidates: Vec<PredictionCandidate> = deduped
            .into_iter()
            .map(|c| {
                let display_capitalized = if prefix.is_some() { started_is_capitalized } else { new_sentence };
                let surface = apply_capitalization(&c.surface, display_capitalized);

                let starts_with_prefix = surface.starts_with(started_text) && !started_text.is_empty();
                let previous_char_count_to_remove = if !starts_with_prefix && !started_text.is_empty() {
                    started_text.chars().count()
                } else {
                    0
                };
                let prediction_to_insert = if starts_with_prefix {
                    surface[started_text.len()..].to_string()
                } else {
                    surface.clone()
                };
                let may_insert_space = !surface
                    .chars()
                    .last()
                    .and_then(Separator::for_char)
                    .map(|s| s.is_apostrophe_class())
                    .unwrap_or(false);

                PredictionCandidate {
                    debug_trace: self.config.enable_debug_information.then(|| {
                        format!(
                            "word_id={} raw_score={:.6} correction_left={:?}",
                            c.word_id, c.raw_score, c.correction_left_part
                        )
                    }),
                    surface,
                    prediction_to_insert,
                    previous_char_count_to_remove,
                    may_insert_space,
                    score: c.raw_score / normalizer,
                    is_correction: c.is_correction,
                    word_id: c.word_id,
                }
            })
            .collect();

        let next_char_count_to_remove = text_after
            .map(|after| {
                after
                    .chars()
                    .take_while(|&c| Separator::for_char(c).is_none())
                    .count()
            })
            .unwrap_or(0);

        let result = PredictionResult { candidates, next_char_count_to_remove };
        self.cache.borrow_mut().put(cache_key, result.clone());
        result
    }

    /// Trains the dynamic model on `text`'s `trainDynamicModel`.
    /// Invalidates the prediction cache, since training mutates the dynamic
    /// trie and the word dictionary that cached results were scored
    /// against.
    pub fn train(&mut self, text: &str, ignore_last_sentence: bool) {
        let span = tracing::span!(tracing::Level::DEBUG, "train", ignore_last_sentence);
        let _enter = span.enter();

        self.cache.borrow_mut().clear();
        let tokens = self.tokenizer.tokenize(text);
        let mut sentences: Vec<Vec<&Token>> = Vec::new();
        let mut current: Vec<&Token> = Vec::new();
        for tok in &tokens {
            match &tok.kind {
                TokenKind::Separator(s) if s.is_sentence_terminating() => {
                    if !current.is_empty() {
                        sentences.push(std::mem::take(&mut current));
                    }
                }
                TokenKind::Separator(_) => {}
                _ => current.push(tok),
            }
        }
        if !current.is_empty() {
            sentences.push(current);
        }
        if ignore_last_sentence {
            sentences.pop();
        }

        let max_order = self.config.max_order;
        for sentence in &sentences {
            let ids: Vec<u32> = sentence
                .iter()
                .map(|t| self.resolve_id(&t.normalized, self.config.add_new_words))
                .collect();

            for i in 0..ids.len() {
                let mut padded = vec![self.sentence_start_id; max_order.saturating_sub(i + 1)];
                padded.extend_from_slice(&ids[padded.len().min(i)..=i]);
                if padded.len() > max_order {
                    let drop = padded.len() - max_order;
                    padded.drain(0..drop);
                }
                for k in 1..=max_order.min(padded.len()) {
                    let suffix = &padded[padded.len() - k..];
                    self.dynamic_trie.increment_path(suffix, 1);
                }
                self.dictionary.increment_user_count(ids[i]);
            }
        }

        let discounts = probability::estimate_discounts(&self.dynamic_trie, self.sentence_start_id, 0.1, 0.9, &[]);
        self.dynamic_trie.update_probabilities(&discounts);
        tracing::debug!(sentence_count = sentences.len(), "training pass complete");
    }

    /// Closes the static trie's file handle. The correction engine owns no
    /// persistent worker pool to shut down — its `thread::scope` call joins
    /// every worker before `generate_corrections` returns.
    pub fn dispose(mut self) {
        self.static_trie = None;
    }
}

fn apply_capitalization(surface: &str, capitalize: bool) -> String {
    if !capitalize {
        return surface.to_string();
    }
    let mut chars = surface.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    fn make_predictor() -> Predictor {
        let mut dict = Dictionary::new("test");
        dict.insert_simple_word("chat");
        dict.insert_simple_word("chien");
        dict.insert_simple_word("chaton");
        let config = PredictionConfig::default();
        Predictor::new(dict, None, config)
    }

    #[test]
    fn empty_prefix_returns_root_continuations() {
        let mut predictor = make_predictor();
        predictor.dynamic_trie.increment_path(&[predictor.dictionary.id_for("chat")], 5);
        predictor.dynamic_trie.update_probabilities(&[0.0, 0.5, 0.5]);
        let result = predictor.predict("", None, 5, &[]);
        assert!(result.candidates.len() <= 5);
    }

    #[test]
    fn started_prefix_completes_partial_word() {
        let mut predictor = make_predictor();
        let result = predictor.predict("le ch", None, 5, &[]);
        assert!(result.candidates.iter().any(|c| c.surface.starts_with("ch")));
        assert!(result.candidates.iter().all(|c| (0.0..=1.0).contains(&c.score)));
    }

    #[test]
    fn min_count_to_provide_prediction_gates_short_prefixes() {
        let mut predictor = make_predictor();
        predictor.config.min_count_to_provide_prediction = 10;
        let result = predictor.predict("le ch", None, 5, &[]);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn zero_correction_max_cost_disables_corrections() {
        let mut predictor = make_predictor();
        predictor.config.enable_word_correction = true;
        predictor.config.correction_max_cost = 0.0;
        let result = predictor.predict("le ch", None, 5, &[]);
        assert!(result.candidates.iter().all(|c| !c.is_correction));
    }
}
