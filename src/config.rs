//! Prediction configuration.
//!
//! A flat, `serde`-derived struct with a `Default` impl carrying the
//! documented defaults, plus TOML load/save helpers so a host application
//! can ship a config file instead of constructing flags in code.

use crate::correction::RuleNode;
use serde::{Deserialize, Serialize};

/// All prediction-affecting flags. Every field has a documented default so a
/// host can override only the ones it cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Allow user-word creation during prediction/training.
    pub add_new_words: bool,
    /// User-word usage count required before a user word participates in
    /// prediction as a first-class candidate.
    pub min_use_count_to_validate_new_word: u32,
    /// Whether the dynamic (per-user) trie is consulted at all.
    pub dynamic_model_enabled: bool,
    /// Floor on the dynamic-trie interpolation weight `wd`.
    pub dynamic_model_minimum_weight: f64,
    /// Skip predictions when the started-word prefix is shorter than this
    /// many characters.
    pub min_count_to_provide_prediction: usize,
    /// Skip corrections when the started-word prefix is shorter than this
    /// many characters.
    pub min_count_to_provide_correction: usize,
    /// Enable the rule-based correction engine at all.
    pub enable_word_correction: bool,
    /// Hard ceiling on accumulated rule cost during correction generation.
    pub correction_max_cost: f64,
    /// Default per-rule factor when a rule does not specify its own.
    pub correction_default_factor: f64,
    /// Default per-rule cost when a rule does not specify its own.
    pub correction_default_cost: f64,
    /// Attach a debug trace to every returned candidate and emit
    /// `tracing::warn!` on post-dedup score collisions.
    pub enable_debug_information: bool,
    /// Root of the compiled correction rule tree.
    #[serde(default)]
    pub correction_rules_root: RuleNode,
    /// Maximum n-gram order consulted by both tries.
    pub max_order: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            add_new_words: true,
            min_use_count_to_validate_new_word: 10,
            dynamic_model_enabled: true,
            dynamic_model_minimum_weight: 0.05,
            min_count_to_provide_prediction: 0,
            min_count_to_provide_correction: 0,
            enable_word_correction: false,
            correction_max_cost: 3.5,
            correction_default_factor: 0.5,
            correction_default_cost: 1.0,
            enable_debug_information: false,
            correction_rules_root: RuleNode::default(),
            max_order: 3,
        }
    }
}

impl PredictionConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
