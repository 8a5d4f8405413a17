//! Fully in-memory, mutable n-gram trie.
//!
//! A recursive node/children tree so arbitrary order contexts (not just
//! unigram/bigram) can be incremented, pruned, and re-estimated.

use super::context::{ContextInfo, NgramTrie};
use crate::error::{PredictError, Result};
use ahash::AHashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const DYNAMIC_MAGIC: &[u8; 8] = b"NGTRIEDY";
const DYNAMIC_HEADER_SIZE: u64 = 16;
const DYNAMIC_RECORD_SIZE: u64 = 16;

#[derive(Debug, Default, Clone)]
pub struct DynamicNode {
    pub count: u64,
    pub frequency: f64,
    pub backoff_weight: f64,
    pub children: AHashMap<u32, DynamicNode>,
}

impl DynamicNode {
    fn children_count_sum(&self) -> u64 {
        self.children.values().map(|c| c.count).sum()
    }

    fn distinct_children_with_count(&self) -> u64 {
        self.children.values().filter(|c| c.count > 0).count() as u64
    }
}

#[derive(Debug)]
pub struct DynamicTrie {
    pub root: DynamicNode,
    pub max_order: usize,
}

/// The three pruning strategies available for reclaiming memory from a
/// grown trie.
pub enum PruneMode {
    RawCountThreshold(u64),
    /// Indexed by order (1-based); `per_order[k-1]` is the threshold for
    /// n-grams of order `k`.
    PerOrderThreshold(Vec<u64>),
    /// Kneser-style weighted-difference pruning: drop an n-gram when
    /// `p(w|h) * (log p(w|h) - log p(w|h'))` falls below the threshold.
    WeightedDifference(f64),
}

impl DynamicTrie {
    pub fn new(max_order: usize) -> Self {
        Self {
            root: DynamicNode::default(),
            max_order,
        }
    }

    pub fn node_for(&self, path: &[u32]) -> Option<&DynamicNode> {
        let mut node = &self.root;
        for &w in path {
            node = node.children.get(&w)?;
        }
        Some(node)
    }

    /// Creates missing nodes along `prefix`, then adds `delta` to the
    /// deepest node's count.
    pub fn increment_path(&mut self, prefix: &[u32], delta: u64) {
        let mut node = &mut self.root;
        for &w in prefix {
            node = node.children.entry(w).or_default();
        }
        node.count = node.count.saturating_add(delta);
    }

    /// Recomputes `frequency` and `childrenBackoffWeight` for every node
    /// under the root using absolute discounting
    ///
    /// `discounts[k - 1]` is `d_k`, the discount for order `k`
    /// (1 ≤ k ≤ `max_order`). The root (order 0) gets no discount.
    pub fn update_probabilities(&mut self, discounts: &[f64]) {
        let root_total: u64 = self.root.children_count_sum();
        for child in self.root.children.values_mut() {
            child.frequency = if root_total > 0 {
                child.count as f64 / root_total as f64
            } else {
                0.0
            };
        }
        self.root.backoff_weight = if root_total > 0 { 0.0 } else { 1.0 };

        Self::update_order(&mut self.root, 1, discounts);
    }

    fn update_order(node: &mut DynamicNode, order: usize, discounts: &[f64]) {
        // `node`'s children are at context-depth `order`; what gets
        // discounted here is their children (depth `order + 1`), so the
        // discount is `d_{order+1}` = `discounts[order]`, not `discounts[order - 1]`.
        let d_k = discounts.get(order).copied().unwrap_or(0.5);
        for child in node.children.values_mut() {
            let total = child.children_count_sum();
            let n1_plus = child.distinct_children_with_count();
            if total > 0 {
                child.backoff_weight = (n1_plus as f64 * d_k) / total as f64;
                for grandchild in child.children.values_mut() {
                    let discounted = (grandchild.count as f64 - d_k).max(0.0);
                    grandchild.frequency = discounted / total as f64;
                }
            } else {
                child.backoff_weight = 1.0;
            }
            Self::update_order(child, order + 1, discounts);
        }
    }

    /// Compute, per order `1..=max_order`, the histogram of n-gram counts
    /// needed by the discount estimator in [`crate::probability`]:
    /// `n1` (count-exactly-one n-grams) and `n2` (count-exactly-two).
    /// Contexts whose path begins with SENTENCE-START are excluded, since
    /// that symbol never itself needs a discount estimate.
    pub fn count_histograms(&self, sentence_start_id: u32) -> Vec<(u64, u64)> {
        let mut histograms = vec![(0u64, 0u64); self.max_order];
        let mut path = Vec::new();
        Self::walk_histogram(&self.root, 0, &mut path, sentence_start_id, &mut histograms);
        histograms
    }

    fn walk_histogram(
        node: &DynamicNode,
        depth: usize,
        path: &mut Vec<u32>,
        sentence_start_id: u32,
        histograms: &mut [(u64, u64)],
    ) {
        if depth > 0 && path.first() != Some(&sentence_start_id) {
            let (n1, n2) = &mut histograms[depth - 1];
            match node.count {
                1 => *n1 += 1,
                2 => *n2 += 1,
                _ => {}
            }
        }
        if depth >= histograms.len() {
            return;
        }
        for (&w, child) in node.children.iter() {
            path.push(w);
            Self::walk_histogram(child, depth + 1, path, sentence_start_id, histograms);
            path.pop();
        }
    }

    /// Runs from the maximum order down to 2, re-estimating probabilities
    /// after each pass
    pub fn prune(&mut self, mode: &PruneMode, discounts: &[f64]) -> Result<()> {
        for order in (2..=self.max_order).rev() {
            let to_remove = self.collect_prunable(order, mode);
            for path in to_remove {
                self.remove_path(&path)?;
            }
            self.update_probabilities(discounts);
        }
        Ok(())
    }

    fn collect_prunable(&self, order: usize, mode: &PruneMode) -> Vec<Vec<u32>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        Self::collect_at_depth(&self.root, order - 1, mode, &mut path, &mut out, self);
        out
    }

    fn collect_at_depth(
        node: &DynamicNode,
        depth_remaining: usize,
        mode: &PruneMode,
        path: &mut Vec<u32>,
        out: &mut Vec<Vec<u32>>,
        trie: &DynamicTrie,
    ) {
        if depth_remaining == 0 {
            for (&w, child) in node.children.iter() {
                let order = path.len() + 1;
                if Self::should_prune(trie, path, w, child, order, mode) {
                    let mut full = path.clone();
                    full.push(w);
                    out.push(full);
                }
            }
            return;
        }
        for (&w, child) in node.children.iter() {
            path.push(w);
            Self::collect_at_depth(child, depth_remaining - 1, mode, path, out, trie);
            path.pop();
        }
    }

    fn should_prune(
        trie: &DynamicTrie,
        context: &[u32],
        word: u32,
        child: &DynamicNode,
        order: usize,
        mode: &PruneMode,
    ) -> bool {
        match mode {
            PruneMode::RawCountThreshold(t) => child.count <= *t,
            PruneMode::PerOrderThreshold(arr) => {
                let t = arr.get(order - 1).copied().unwrap_or(0);
                child.count <= t
            }
            PruneMode::WeightedDifference(threshold) => {
                let p_h = crate::probability::probability_in_trie(trie, context, word);
                if p_h <= 0.0 {
                    return true;
                }
                let shorter = if context.is_empty() { &[][..] } else { &context[1..] };
                let p_h_prime = crate::probability::probability_in_trie(trie, shorter, word).max(1e-12);
                let score = p_h * (p_h.ln() - p_h_prime.ln());
                score < *threshold
            }
        }
    }

    fn remove_path(&mut self, path: &[u32]) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        let mut node = &mut self.root;
        for &w in &path[..path.len() - 1] {
            node = node
                .children
                .get_mut(&w)
                .ok_or_else(|| PredictError::InvalidPrefix { prefix: path.to_vec() })?;
        }
        node.children.remove(path.last().unwrap());
        Ok(())
    }

    /// Total unigram count at the root, used by the static/dynamic
    /// interpolation weight.
    pub fn total_unigram_count(&self) -> u64 {
        self.root.children_count_sum()
    }
}

impl NgramTrie for DynamicTrie {
    fn context_info(&self, path: &[u32]) -> Option<ContextInfo> {
        let node = self.node_for(path)?;
        Some(ContextInfo {
            backoff_weight: node.backoff_weight,
            children: node
                .children
                .iter()
                .map(|(&id, c)| (id, c.frequency))
                .collect(),
        })
    }
}

/// One fixed-width 16-byte record: four 32-bit integers, no frequencies —
/// probabilities are recomputed by `update_probabilities` after a reload.
struct DynamicRecord {
    word_id: u32,
    children_count: u32,
    children_offset: u32,
    count: u32,
}

impl DynamicRecord {
    fn to_bytes(&self) -> [u8; DYNAMIC_RECORD_SIZE as usize] {
        let mut buf = [0u8; DYNAMIC_RECORD_SIZE as usize];
        buf[0..4].copy_from_slice(&self.word_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.children_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.children_offset.to_le_bytes());
        buf[12..16].copy_from_slice(&self.count.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        Self {
            word_id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            children_count: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            children_offset: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            count: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
        }
    }
}

fn map_eof(e: std::io::Error, path: &Path) -> PredictError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        PredictError::CorruptFile {
            path: path.to_path_buf(),
            reason: "unexpected end of file".to_string(),
        }
    } else {
        PredictError::Io(e)
    }
}

/// Serializes raw counts (no frequencies) level by level in BFS order, same
/// shape as the static trie file but with 16-byte records.
pub fn write_dynamic<P: AsRef<Path>>(path: P, trie: &DynamicTrie) -> Result<()> {
    let mut levels: Vec<Vec<(u32, &DynamicNode)>> = Vec::new();
    let mut current: Vec<(u32, &DynamicNode)> = {
        let mut v: Vec<_> = trie.root.children.iter().map(|(&id, n)| (id, n)).collect();
        v.sort_by_key(|(id, _)| *id);
        v
    };

    while !current.is_empty() && levels.len() < trie.max_order {
        let mut next = Vec::new();
        for (_, node) in &current {
            let mut kids: Vec<_> = node.children.iter().map(|(&id, n)| (id, n)).collect();
            kids.sort_by_key(|(id, _)| *id);
            next.extend(kids);
        }
        levels.push(std::mem::take(&mut current));
        current = next;
    }
    if !current.is_empty() {
        levels.push(current);
    }

    let mut level_offsets = vec![0u64; levels.len()];
    let mut offset = DYNAMIC_HEADER_SIZE + DYNAMIC_RECORD_SIZE;
    for (i, level) in levels.iter().enumerate() {
        level_offsets[i] = offset;
        offset += level.len() as u64 * DYNAMIC_RECORD_SIZE;
    }

    let mut children_info: Vec<Vec<(u32, u32)>> = vec![Vec::new(); levels.len()];
    for i in 0..levels.len() {
        let mut cursor = 0u32;
        for (_, node) in &levels[i] {
            let count = node.children.len() as u32;
            let child_offset = if i + 1 < levels.len() && count > 0 {
                level_offsets[i + 1] + cursor as u64 * DYNAMIC_RECORD_SIZE
            } else {
                0
            };
            children_info[i].push((child_offset as u32, if i + 1 < levels.len() { count } else { 0 }));
            cursor += count;
        }
    }

    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    let mut header = Vec::with_capacity(DYNAMIC_HEADER_SIZE as usize);
    header.extend_from_slice(DYNAMIC_MAGIC);
    header.extend_from_slice(&(trie.max_order as u32).to_le_bytes());
    header.extend_from_slice(&[0u8; 4]);
    writer.write_all(&header)?;

    let root_children_offset = if levels.is_empty() { 0 } else { level_offsets[0] as u32 };
    let root_record = DynamicRecord {
        word_id: 0,
        children_count: levels.first().map(|l| l.len()).unwrap_or(0) as u32,
        children_offset: root_children_offset,
        count: 0,
    };
    writer.write_all(&root_record.to_bytes())?;

    for (i, level) in levels.iter().enumerate() {
        for (idx, (word_id, node)) in level.iter().enumerate() {
            let (children_offset, children_count) = children_info[i][idx];
            let record = DynamicRecord {
                word_id: *word_id,
                children_count,
                children_offset,
                count: node.count as u32,
            };
            writer.write_all(&record.to_bytes())?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Reads a file written by [`write_dynamic`] back into a fresh [`DynamicTrie`].
/// `frequency`/`backoff_weight` are left at their zero defaults; the caller
/// is expected to call `update_probabilities` to re-estimate them.
pub fn read_dynamic<P: AsRef<Path>>(path: P) -> Result<DynamicTrie> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let mut file = File::open(&path)?;

    let mut header = [0u8; DYNAMIC_HEADER_SIZE as usize];
    file.read_exact(&mut header).map_err(|e| map_eof(e, &path))?;
    if &header[0..8] != DYNAMIC_MAGIC {
        return Err(PredictError::CorruptFile {
            path: path.clone(),
            reason: "bad magic".to_string(),
        });
    }
    let max_order = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;

    let mut root_buf = [0u8; DYNAMIC_RECORD_SIZE as usize];
    file.read_exact(&mut root_buf).map_err(|e| map_eof(e, &path))?;
    let root_record = DynamicRecord::from_bytes(&root_buf);

    let mut rest = Vec::new();
    file.read_to_end(&mut rest).map_err(|e| map_eof(e, &path))?;

    let base_offset = DYNAMIC_HEADER_SIZE + DYNAMIC_RECORD_SIZE;
    let root_children = read_dynamic_children(
        &rest,
        base_offset,
        root_record.children_offset as u64,
        root_record.children_count,
        &path,
    )?;

    Ok(DynamicTrie {
        root: DynamicNode {
            count: 0,
            frequency: 0.0,
            backoff_weight: 0.0,
            children: root_children,
        },
        max_order,
    })
}

fn read_dynamic_children(
    buf: &[u8],
    base_offset: u64,
    offset: u64,
    count: u32,
    path: &Path,
) -> Result<AHashMap<u32, DynamicNode>> {
    let mut children = AHashMap::default();
    if count == 0 {
        return Ok(children);
    }
    let start = (offset - base_offset) as usize;
    let end = start + count as usize * DYNAMIC_RECORD_SIZE as usize;
    if end > buf.len() {
        return Err(PredictError::CorruptFile {
            path: path.to_path_buf(),
            reason: "truncated child block".to_string(),
        });
    }
    for chunk in buf[start..end].chunks_exact(DYNAMIC_RECORD_SIZE as usize) {
        let record = DynamicRecord::from_bytes(chunk);
        let grandchildren = read_dynamic_children(
            buf,
            base_offset,
            record.children_offset as u64,
            record.children_count,
            path,
        )?;
        children.insert(
            record.word_id,
            DynamicNode {
                count: record.count as u64,
                frequency: 0.0,
                backoff_weight: 0.0,
                children: grandchildren,
            },
        );
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_path_creates_nodes() {
        let mut trie = DynamicTrie::new(3);
        trie.increment_path(&[1, 2], 5);
        assert_eq!(trie.node_for(&[1, 2]).unwrap().count, 5);
        assert!(trie.node_for(&[1]).is_some());
    }

    #[test]
    fn update_probabilities_sums_to_one_when_children_present() {
        let mut trie = DynamicTrie::new(2);
        trie.increment_path(&[1], 10);
        trie.increment_path(&[2], 5);
        trie.update_probabilities(&[0.0, 0.5]);
        let sum: f64 = trie.root.children.values().map(|c| c.frequency).sum();
        assert!((sum + trie.root.backoff_weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn update_probabilities_applies_discount_for_correct_order() {
        let mut trie = DynamicTrie::new(3);
        trie.increment_path(&[1], 10);
        trie.increment_path(&[2], 5);
        trie.increment_path(&[1, 3], 7);
        trie.increment_path(&[1, 4], 3);

        // discounts[0] = d_1, discounts[1] = d_2, discounts[2] = d_3.
        trie.update_probabilities(&[0.0, 0.5, 0.3]);

        // The bigram nodes under "1" must be discounted with d_2 (0.5), not
        // d_1 (0.0): (7 - 0.5) / 10 = 0.65, (3 - 0.5) / 10 = 0.25.
        let node_3 = trie.node_for(&[1, 3]).unwrap();
        let node_4 = trie.node_for(&[1, 4]).unwrap();
        assert!((node_3.frequency - 0.65).abs() < 1e-9);
        assert!((node_4.frequency - 0.25).abs() < 1e-9);

        // backoff_weight for "1" = (n1_plus * d_2) / total = (2 * 0.5) / 10.
        let node_1 = trie.node_for(&[1]).unwrap();
        assert!((node_1.backoff_weight - 0.1).abs() < 1e-9);
    }

    #[test]
    fn dynamic_file_round_trip_preserves_counts_and_probabilities() {
        let mut trie = DynamicTrie::new(3);
        trie.increment_path(&[1], 10);
        trie.increment_path(&[2], 5);
        trie.increment_path(&[1, 3], 7);
        trie.increment_path(&[1, 4], 3);
        trie.increment_path(&[1, 3, 5], 2);
        let discounts = [0.0, 0.5, 0.3];
        trie.update_probabilities(&discounts);

        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "predict_engine_dynamic_trie_test_{}.bin",
            crate::time::now_unix_millis()
        ));
        write_dynamic(&path, &trie).unwrap();

        let mut reloaded = read_dynamic(&path).unwrap();
        assert_eq!(reloaded.max_order, 3);

        assert_eq!(reloaded.node_for(&[1]).unwrap().count, 10);
        assert_eq!(reloaded.node_for(&[2]).unwrap().count, 5);
        assert_eq!(reloaded.node_for(&[1, 3]).unwrap().count, 7);
        assert_eq!(reloaded.node_for(&[1, 4]).unwrap().count, 3);
        assert_eq!(reloaded.node_for(&[1, 3, 5]).unwrap().count, 2);

        reloaded.update_probabilities(&discounts);
        for path in [&[1][..], &[2][..], &[1, 3][..], &[1, 4][..], &[1, 3, 5][..]] {
            let before = trie.node_for(path).unwrap();
            let after = reloaded.node_for(path).unwrap();
            assert!((before.frequency - after.frequency).abs() < 1e-9);
            assert!((before.backoff_weight - after.backoff_weight).abs() < 1e-9);
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn prune_raw_threshold_removes_low_count_bigrams() {
        let mut trie = DynamicTrie::new(2);
        trie.increment_path(&[1], 100);
        trie.increment_path(&[1, 2], 1);
        trie.update_probabilities(&[0.0, 0.5]);
        trie.prune(&PruneMode::RawCountThreshold(5), &[0.0, 0.5]).unwrap();
        assert!(trie.node_for(&[1, 2]).is_none());
        assert!(trie.node_for(&[1]).is_some());
    }
}
