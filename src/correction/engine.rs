//! Recursive correction-candidate generation and its outer-level worker-pool
//! fan-out.
//!
//! The outer fan-out is modeled with `std::thread::scope`: no thread-pool
//! crate is otherwise needed here, so scoped stdlib threads are the
//! idiomatic choice rather than pulling in one for this alone.

use super::rule::AtomicRule;
use crate::separator::Separator;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// One generated correction: the candidate's parts (one for a single-word
/// candidate, two for a split candidate) and its final factor.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedCandidate {
    pub parts: Vec<String>,
    pub factor: f64,
}

impl CorrectedCandidate {
    pub fn key(&self) -> String {
        self.parts.join("\u{0}")
    }
}

#[derive(Debug, Clone)]
struct GenState {
    current_part: String,
    previous_parts: Vec<String>,
    total_cost: f64,
    total_factor: f64,
    applied_rule_count: u32,
    forbidden_rules: HashSet<usize>,
    start_from: usize,
}

/// Splits `chars` at the first separator character: apostrophes
/// stay attached to the left part, other separators are dropped entirely.
fn split_by_separator(chars: &[char]) -> Option<(Vec<char>, Vec<char>)> {
    for (i, &c) in chars.iter().enumerate() {
        if let Some(sep) = Separator::for_char(c) {
            return Some(if sep.is_apostrophe_class() {
                (chars[..=i].to_vec(), chars[i + 1..].to_vec())
            } else {
                (chars[..i].to_vec(), chars[i + 1..].to_vec())
            });
        }
    }
    None
}

fn insert_keep_max(out: &mut HashMap<String, CorrectedCandidate>, candidate: CorrectedCandidate) {
    let key = candidate.key();
    match out.get(&key) {
        Some(existing) if existing.factor >= candidate.factor => {}
        _ => {
            out.insert(key, candidate);
        }
    }
}

/// Applies `rule` (at index `rule_idx` in the full rule set, for
/// `forbidden_rules` bookkeeping) to `state.current_part` at position `i`,
/// returning the resulting state if the rule's window, cost budget, match,
/// and any split-validation callbacks all accept it.
fn apply_rule(
    state: &GenState,
    rule_idx: usize,
    rule: &AtomicRule,
    i: usize,
    max_cost: f64,
    validate_prefix: &(dyn Fn(&str) -> bool + Sync),
    validate_word: &(dyn Fn(&str) -> bool + Sync),
) -> Option<GenState> {
    if state.forbidden_rules.contains(&rule_idx) {
        return None;
    }
    let chars: Vec<char> = state.current_part.chars().collect();
    if !rule.admits(i, chars.len()) {
        return None;
    }
    if state.total_cost + rule.cost >= max_cost {
        return None;
    }

    let error_chars: Vec<char> = rule.error.chars().collect();
    let matches = if error_chars.is_empty() {
        true
    } else {
        i + error_chars.len() <= chars.len() && chars[i..i + error_chars.len()] == error_chars[..]
    };
    if !matches {
        return None;
    }

    let mut new_chars = chars[..i].to_vec();
    new_chars.extend(rule.replacement.chars());
    new_chars.extend(&chars[i + error_chars.len()..]);

    let (new_current, new_previous, new_start) = match split_by_separator(&new_chars) {
        Some((left, right)) => {
            let left_s: String = left.into_iter().collect();
            let right_s: String = right.into_iter().collect();
            if !validate_word(&left_s) || !validate_prefix(&right_s) {
                return None;
            }
            let mut prev = state.previous_parts.clone();
            prev.push(left_s);
            (right_s, prev, 0usize)
        }
        None => {
            let current_s: String = new_chars.into_iter().collect();
            if !validate_prefix(&current_s) {
                return None;
            }
            let advanced = i + rule.replacement.chars().count();
            (current_s, state.previous_parts.clone(), advanced)
        }
    };

    let mut forbidden_rules = state.forbidden_rules.clone();
    if error_chars.is_empty() {
        forbidden_rules.insert(rule_idx);
    }

    let clamped_start = new_start.min(new_current.chars().count());
    Some(GenState {
        current_part: new_current,
        previous_parts: new_previous,
        total_cost: state.total_cost + rule.cost,
        total_factor: state.total_factor + rule.factor,
        applied_rule_count: state.applied_rule_count + 1,
        forbidden_rules,
        start_from: clamped_start,
    })
}

/// Recurse from `state`, materializing a candidate for the current state
/// (once at least one rule has applied) and exploring every admissible
/// `(start, rule)` pair from `state.start_from` onward against the full
/// rule set, so multiple rules can compose into a single candidate.
fn recurse(
    state: GenState,
    rules: &[AtomicRule],
    max_cost: f64,
    validate_prefix: &(dyn Fn(&str) -> bool + Sync),
    validate_word: &(dyn Fn(&str) -> bool + Sync),
    out: &mut HashMap<String, CorrectedCandidate>,
) {
    if state.applied_rule_count > 0 {
        let factor = (state.total_factor / state.applied_rule_count as f64) / state.total_cost.max(1e-9);
        let mut parts = state.previous_parts.clone();
        parts.push(state.current_part.clone());
        insert_keep_max(out, CorrectedCandidate { parts, factor });
    }

    let char_count = state.current_part.chars().count();
    for i in state.start_from..=char_count {
        for (rule_idx, rule) in rules.iter().enumerate() {
            if let Some(next_state) =
                apply_rule(&state, rule_idx, rule, i, max_cost, validate_prefix, validate_word)
            {
                recurse(next_state, rules, max_cost, validate_prefix, validate_word, out);
            }
        }
    }
}

/// Generate corrections for `prefix`. The outermost expansion (every
/// admissible `(start, rule)` pair against the lowercased initial prefix)
/// is dispatched across a worker pool sized to the hardware concurrency;
/// deeper recursion runs synchronously on whichever worker picked up that
/// branch.
pub fn generate_corrections(
    prefix: &str,
    rules: &[AtomicRule],
    max_cost: f64,
    validate_prefix: &(dyn Fn(&str) -> bool + Sync),
    validate_word: &(dyn Fn(&str) -> bool + Sync),
) -> HashMap<String, CorrectedCandidate> {
    if max_cost <= 0.0 || rules.is_empty() {
        return HashMap::new();
    }

    let lowered = prefix.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();
    let initial = GenState {
        current_part: lowered.clone(),
        previous_parts: Vec::new(),
        total_cost: 0.0,
        total_factor: 0.0,
        applied_rule_count: 0,
        forbidden_rules: HashSet::new(),
        start_from: 0,
    };

    // Collect admissible (start, rule index) pairs for the *outermost*
    // expansion only; everything deeper runs synchronously inside `recurse`,
    // composing freely across the full rule set.
    let mut jobs: Vec<(usize, usize)> = Vec::new();
    for i in 0..=chars.len() {
        for (rule_idx, rule) in rules.iter().enumerate() {
            if rule.admits(i, chars.len()) && rule.cost < max_cost {
                jobs.push((i, rule_idx));
            }
        }
    }

    let shared: Mutex<HashMap<String, CorrectedCandidate>> = Mutex::new(HashMap::new());
    let pool_size = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

    std::thread::scope(|scope| {
        let chunk_size = jobs.len().div_ceil(pool_size.max(1)).max(1);
        for chunk in jobs.chunks(chunk_size) {
            let initial = initial.clone();
            let shared = &shared;
            scope.spawn(move || {
                let mut local = HashMap::new();
                for &(start, rule_idx) in chunk {
                    if let Some(next_state) = apply_rule(
                        &initial,
                        rule_idx,
                        &rules[rule_idx],
                        start,
                        max_cost,
                        validate_prefix,
                        validate_word,
                    ) {
                        recurse(next_state, rules, max_cost, validate_prefix, validate_word, &mut local);
                    }
                }
                let mut guard = shared.lock().expect("correction worker pool mutex poisoned");
                for (_, candidate) in local {
                    insert_keep_max(&mut guard, candidate);
                }
            });
        }
    });

    shared.into_inner().expect("correction worker pool mutex poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::rule::{default_accent_rules, flatten};

    #[test]
    fn zero_max_cost_yields_no_corrections() {
        let rules = flatten(&default_accent_rules(), 1.0, 0.5);
        let out = generate_corrections("eta", &rules, 0.0, &|_| true, &|_| true);
        assert!(out.is_empty());
    }

    #[test]
    fn accent_restoration_produces_candidate() {
        let rules = flatten(&default_accent_rules(), 1.0, 0.5);
        let out = generate_corrections("eta", &rules, 3.5, &|_| true, &|_| true);
        assert!(out.values().any(|c| c.parts.iter().any(|p| p.contains('é') || p.contains('à'))));
    }

    fn single_char_rule(error: &str, replacement: &str) -> AtomicRule {
        AtomicRule {
            error: error.to_string(),
            replacement: replacement.to_string(),
            cost: 1.0,
            factor: 1.0,
            max_from_start: None,
            min_from_start: None,
            max_from_end: None,
            min_from_end: None,
        }
    }

    #[test]
    fn two_distinct_rules_compose_into_one_candidate() {
        let rules = vec![single_char_rule("a", "b"), single_char_rule("c", "d")];
        let out = generate_corrections("ac", &rules, 2.5, &|_| true, &|_| true);
        assert!(
            out.values().any(|c| c.parts == vec!["bd".to_string()]),
            "expected a candidate from composing both rules, got: {out:?}"
        );
    }
}
