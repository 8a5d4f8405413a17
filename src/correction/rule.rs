//! The correction rule tree and its flattened, atomic form.
//!
//! A rule tree is authored with groups that can be disabled to mask whole
//! subtrees; at compile time (`flatten`) it collapses into a deduplicated
//! set of atomic `error -> replacement` pairs, each carrying its own
//! positional window and cost/factor.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `-1` means "unbounded" in the source representation; `None` here.
pub type Window = Option<u32>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionRule {
    pub errors: Vec<String>,
    pub replacements: Vec<String>,
    pub cost: Option<f64>,
    pub factor: Option<f64>,
    pub max_from_start: Window,
    pub min_from_start: Window,
    pub max_from_end: Window,
    pub min_from_end: Window,
    pub bidirectional: bool,
    /// Strings treated as interchangeable; expands to the cross product of
    /// distinct pairs within the set.
    pub confusion_set: Option<Vec<String>>,
}

/// A node in the rule tree. Non-leaf nodes (`rule.is_none()`) only gate
/// their children; leaves carry one `CorrectionRule`. Disabling a node
/// masks its entire subtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleNode {
    pub enabled: bool,
    pub rule: Option<CorrectionRule>,
    pub children: Vec<RuleNode>,
}

/// One flattened `error -> replacement` pair ready for candidate
/// generation; windows are `None` for "unbounded" (the `-1` of the source
/// representation).
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicRule {
    pub error: String,
    pub replacement: String,
    pub cost: f64,
    pub factor: f64,
    pub max_from_start: Window,
    pub min_from_start: Window,
    pub max_from_end: Window,
    pub min_from_end: Window,
}

impl AtomicRule {
    /// Whether position `start` (in chars from the left of the current
    /// part) is inside this rule's window, given the part's total length.
    pub fn admits(&self, start: usize, part_len: usize) -> bool {
        let from_end = part_len.saturating_sub(start);
        if let Some(max) = self.max_from_start {
            if start as u32 > max {
                return false;
            }
        }
        if let Some(min) = self.min_from_start {
            if (start as u32) < min {
                return false;
            }
        }
        if let Some(max) = self.max_from_end {
            if from_end as u32 > max {
                return false;
            }
        }
        if let Some(min) = self.min_from_end {
            if (from_end as u32) < min {
                return false;
            }
        }
        true
    }
}

/// Flatten a rule tree into a deduplicated set of atomic pairs. Disabled
/// nodes (and their subtrees) are skipped entirely.
pub fn flatten(root: &RuleNode, default_cost: f64, default_factor: f64) -> Vec<AtomicRule> {
    let mut out: HashMap<(String, String), AtomicRule> = HashMap::new();
    flatten_into(root, default_cost, default_factor, &mut out);
    out.into_values().collect()
}

fn flatten_into(
    node: &RuleNode,
    default_cost: f64,
    default_factor: f64,
    out: &mut HashMap<(String, String), AtomicRule>,
) {
    if !node.enabled {
        return;
    }
    if let Some(rule) = &node.rule {
        let cost = rule.cost.unwrap_or(default_cost);
        let factor = rule.factor.unwrap_or(default_factor);

        let mut pairs: Vec<(String, String)> = Vec::new();
        for e in &rule.errors {
            for r in &rule.replacements {
                pairs.push((e.clone(), r.clone()));
            }
        }
        if let Some(set) = &rule.confusion_set {
            for a in set {
                for b in set {
                    if a != b {
                        pairs.push((a.clone(), b.clone()));
                    }
                }
            }
        }
        if rule.bidirectional {
            let mirrored: Vec<(String, String)> =
                pairs.iter().map(|(e, r)| (r.clone(), e.clone())).collect();
            pairs.extend(mirrored);
        }

        for (error, replacement) in pairs {
            let atomic = AtomicRule {
                error,
                replacement,
                cost,
                factor,
                max_from_start: rule.max_from_start,
                min_from_start: rule.min_from_start,
                max_from_end: rule.max_from_end,
                min_from_end: rule.min_from_end,
            };
            out.insert((atomic.error.clone(), atomic.replacement.clone()), atomic);
        }
    }
    for child in &node.children {
        flatten_into(child, default_cost, default_factor, out);
    }
}

/// A small, realistic default: accent restoration for a handful of French
/// vowels, unbounded in position. Hosts are expected to supply their own
/// rule tree via configuration; this only keeps `PredictionConfig::default()`
/// non-degenerate out of the box.
pub fn default_accent_rules() -> RuleNode {
    let pairs = [("e", "é"), ("e", "è"), ("a", "à"), ("u", "ù")];
    RuleNode {
        enabled: true,
        rule: None,
        children: pairs
            .iter()
            .map(|(from, to)| RuleNode {
                enabled: true,
                rule: Some(CorrectionRule {
                    errors: vec![from.to_string()],
                    replacements: vec![to.to_string()],
                    cost: None,
                    factor: None,
                    max_from_start: None,
                    min_from_start: None,
                    max_from_end: None,
                    min_from_end: None,
                    bidirectional: false,
                    confusion_set: None,
                }),
                children: Vec::new(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_node_is_skipped() {
        let mut root = default_accent_rules();
        root.enabled = false;
        assert!(flatten(&root, 1.0, 0.5).is_empty());
    }

    #[test]
    fn bidirectional_produces_mirror() {
        let rule = CorrectionRule {
            errors: vec!["ei".to_string()],
            replacements: vec!["ie".to_string()],
            bidirectional: true,
            ..Default::default()
        };
        let root = RuleNode {
            enabled: true,
            rule: Some(rule),
            children: Vec::new(),
        };
        let atoms = flatten(&root, 1.0, 0.5);
        assert_eq!(atoms.len(), 2);
        assert!(atoms.iter().any(|a| a.error == "ei" && a.replacement == "ie"));
        assert!(atoms.iter().any(|a| a.error == "ie" && a.replacement == "ei"));
    }

    #[test]
    fn window_admission() {
        let atom = AtomicRule {
            error: "e".into(),
            replacement: "é".into(),
            cost: 1.0,
            factor: 0.5,
            max_from_start: Some(2),
            min_from_start: None,
            max_from_end: None,
            min_from_end: None,
        };
        assert!(atom.admits(0, 5));
        assert!(atom.admits(2, 5));
        assert!(!atom.admits(3, 5));
    }
}
