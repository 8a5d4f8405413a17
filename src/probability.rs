//! Absolute-discount smoothing, recursive back-off, and static/dynamic
//! interpolation.
//!
//! Works for an arbitrary recursive order rather than a fixed
//! unigram/bigram/trigram triple. A missing continuation floors to
//! probability 0.0 rather than `None`, so callers never have to
//! special-case an absent entry.

use crate::ngram::{DynamicTrie, NgramTrie, StaticTrie};

/// `p(w|h)` within a single trie, recursively:
/// - `h` empty: the root child's stored frequency.
/// - `h` present: `child(h, w).frequency + node(h).childrenBackoffWeight * p(w|h[1:])`.
/// - `h` absent: fall back to `p(w|h[1:])` without contributing backoff mass.
pub fn probability_in_trie<T: NgramTrie>(trie: &T, context: &[u32], word: u32) -> f64 {
    if context.is_empty() {
        return trie
            .context_info(&[])
            .map(|info| info.child_frequency(word))
            .unwrap_or(0.0);
    }
    match trie.context_info(context) {
        Some(info) => {
            info.child_frequency(word) + info.backoff_weight * probability_in_trie(trie, &context[1..], word)
        }
        None => probability_in_trie(trie, &context[1..], word),
    }
}

/// `d_k = n1_k / (n1_k + 2*n2_k)`, clamped into `[lower, upper]`; `0.5` if
/// the ratio is NaN (both histograms empty).
pub fn estimate_discount(n1: u64, n2: u64, lower: f64, upper: f64) -> f64 {
    let denom = n1 as f64 + 2.0 * n2 as f64;
    let d = if denom == 0.0 { f64::NAN } else { n1 as f64 / denom };
    if d.is_nan() {
        0.5
    } else {
        d.clamp(lower, upper)
    }
}

/// One discount per order, driven by a dynamic trie's count histograms
/// (sentence-initial n-grams already excluded by
/// [`DynamicTrie::count_histograms`]). A configured override, when present,
/// wins outright for that order.
pub fn estimate_discounts(
    trie: &DynamicTrie,
    sentence_start_id: u32,
    lower: f64,
    upper: f64,
    overrides: &[Option<f64>],
) -> Vec<f64> {
    let histograms = trie.count_histograms(sentence_start_id);
    histograms
        .iter()
        .enumerate()
        .map(|(i, &(n1, n2))| {
            overrides
                .get(i)
                .and_then(|o| *o)
                .unwrap_or_else(|| estimate_discount(n1, n2, lower, upper))
        })
        .collect()
}

/// Static/dynamic interpolation weights: `wd = max(min_weight,
/// dynamic_unigrams / static_unigrams)`, `ws = 1 - wd`. `wd = 0` when there
/// is no dynamic trie.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationWeights {
    pub ws: f64,
    pub wd: f64,
}

impl InterpolationWeights {
    pub fn compute(dynamic_unigrams: u64, static_unigrams: u64, min_weight: f64) -> Self {
        if static_unigrams == 0 {
            return Self { ws: 1.0, wd: 0.0 };
        }
        let ratio = dynamic_unigrams as f64 / static_unigrams as f64;
        let wd = ratio.max(min_weight);
        Self { ws: 1.0 - wd, wd }
    }

    pub fn none() -> Self {
        Self { ws: 1.0, wd: 0.0 }
    }
}

/// `p_final(w|h) = ws * p_static(w|h) + wd * p_dynamic(w|h)`. The
/// word's `probFactor` and the candidate's rule-derived correction factor
/// are applied by the caller, not here.
pub fn probability_interpolated(
    static_trie: Option<&StaticTrie>,
    dynamic_trie: Option<&DynamicTrie>,
    context: &[u32],
    word: u32,
    min_dynamic_weight: f64,
) -> f64 {
    let p_static = static_trie
        .map(|t| probability_in_trie(t, context, word))
        .unwrap_or(0.0);

    let Some(dynamic) = dynamic_trie else {
        return p_static;
    };

    let weights = InterpolationWeights::compute(
        dynamic.total_unigram_count(),
        static_trie.map(|t| t.total_unigram_count).unwrap_or(0),
        min_dynamic_weight,
    );
    let p_dynamic = probability_in_trie(dynamic, context, word);
    weights.ws * p_static + weights.wd * p_dynamic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ngram::DynamicTrie;

    #[test]
    fn discount_clamped_and_nan_fallback() {
        assert_eq!(estimate_discount(0, 0, 0.1, 0.9), 0.5);
        assert!((estimate_discount(1, 1, 0.0, 1.0) - (1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(estimate_discount(100, 0, 0.0, 0.5), 0.5);
    }

    #[test]
    fn probability_bounded_in_zero_one() {
        let mut trie = DynamicTrie::new(2);
        trie.increment_path(&[1], 10);
        trie.increment_path(&[1, 2], 4);
        trie.update_probabilities(&[0.0, 0.5]);
        let p = probability_in_trie(&trie, &[1], 2);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn interpolation_weight_floors_at_minimum() {
        let weights = InterpolationWeights::compute(0, 1000, 0.05);
        assert_eq!(weights.wd, 0.05);
        assert!((weights.ws - 0.95).abs() < 1e-12);
    }

    #[test]
    fn no_dynamic_trie_means_zero_weight() {
        assert_eq!(InterpolationWeights::none().wd, 0.0);
    }
}
