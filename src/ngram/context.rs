//! Shared lookup surface for the static and dynamic n-gram tries.
//!
//! Both tries answer the same question — "what is the back-off mass and
//! per-child frequency at this context?" — but get there differently (one
//! walks an in-memory map, the other lazily loads file-backed children
//! through a cache). `ContextInfo` lets the probability engine in
//! [`crate::probability`] stay oblivious to which one it is talking to.

/// Snapshot of one trie node's children frequencies plus its back-off mass.
/// Cheap to build (contexts are small in the target vocabulary sizes) and
/// avoids threading lifetimes through the static trie's `RefCell` cache.
#[derive(Debug, Clone, Default)]
pub struct ContextInfo {
    pub backoff_weight: f64,
    pub children: Vec<(u32, f64)>,
}

impl ContextInfo {
    pub fn child_frequency(&self, word_id: u32) -> f64 {
        self.children
            .iter()
            .find(|(id, _)| *id == word_id)
            .map(|(_, f)| *f)
            .unwrap_or(0.0)
    }
}

/// Implemented by both trie flavors so the probability engine and the
/// predictor's candidate enumeration can share one code path.
pub trait NgramTrie {
    /// `path` is the context `h`; an empty path means the root. Returns
    /// `None` if `h` itself was never recorded (the fall-through case).
    fn context_info(&self, path: &[u32]) -> Option<ContextInfo>;

    /// Up to `limit` children of the deepest node reached by `path`,
    /// excluding ids in `exclude`, ordered by descending frequency.
    fn list_next_words(&self, path: &[u32], limit: usize, exclude: &[u32]) -> Vec<(u32, f64)> {
        let Some(info) = self.context_info(path) else {
            return Vec::new();
        };
        let mut children = info.children;
        children.retain(|(id, _)| !exclude.contains(id));
        children.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        children.truncate(limit);
        children
    }
}
