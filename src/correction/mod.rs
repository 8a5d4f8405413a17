//! Rule-tree-driven correction-candidate generation.

pub mod engine;
pub mod rule;

pub use engine::{generate_corrections, CorrectedCandidate};
pub use rule::{default_accent_rules, flatten, AtomicRule, CorrectionRule, RuleNode, Window};
