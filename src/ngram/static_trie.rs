//! On-disk, lazily-loaded, read-only n-gram trie.
//!
//! The binary layout is hand-rolled (not `bincode`'s variable-length
//! encoding) because a node's children must be locatable and readable
//! purely by byte offset, without parsing anything before them (see
//! DESIGN.md).

use super::context::{ContextInfo, NgramTrie};
use super::dynamic_trie::DynamicTrie;
use crate::error::{PredictError, Result};
use ahash::AHashMap;
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"NGTRIE01";
const HEADER_SIZE: u64 = 24;
const RECORD_SIZE: u64 = 28;

/// One fixed-width 28-byte record: three 32-bit integers and two 64-bit
/// floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticNode {
    pub word_id: u32,
    pub children_count: u32,
    pub children_offset: u32,
    pub frequency: f64,
    pub backoff_weight: f64,
}

impl StaticNode {
    fn to_bytes(self) -> [u8; RECORD_SIZE as usize] {
        let mut buf = [0u8; RECORD_SIZE as usize];
        buf[0..4].copy_from_slice(&self.word_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.children_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.children_offset.to_le_bytes());
        buf[12..20].copy_from_slice(&self.frequency.to_le_bytes());
        buf[20..28].copy_from_slice(&self.backoff_weight.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        Self {
            word_id: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            children_count: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            children_offset: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            frequency: f64::from_le_bytes(buf[12..20].try_into().unwrap()),
            backoff_weight: f64::from_le_bytes(buf[20..28].try_into().unwrap()),
        }
    }
}

/// Read-only handle on a static trie file. Children are loaded on first
/// access and cached in a per-node map keyed by byte offset; there is no
/// eviction: working sets are small relative to RAM.
pub struct StaticTrie {
    file: RefCell<File>,
    path: PathBuf,
    root: StaticNode,
    pub max_order: usize,
    pub total_unigram_count: u64,
    cache: RefCell<AHashMap<u32, Vec<StaticNode>>>,
}

impl StaticTrie {
    /// Opens the file, reads the header and root, and leaves children lazy.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header).map_err(|e| map_eof(e, &path))?;
        if &header[0..8] != MAGIC {
            return Err(PredictError::CorruptFile {
                path: path.clone(),
                reason: "bad magic".to_string(),
            });
        }
        let max_order = u32::from_le_bytes(header[12..16].try_into().unwrap()) as usize;
        let total_unigram_count = u64::from_le_bytes(header[16..24].try_into().unwrap());

        let mut root_buf = [0u8; RECORD_SIZE as usize];
        file.read_exact(&mut root_buf).map_err(|e| map_eof(e, &path))?;
        let root = StaticNode::from_bytes(&root_buf);

        Ok(Self {
            file: RefCell::new(file),
            path,
            root,
            max_order,
            total_unigram_count,
            cache: RefCell::new(AHashMap::new()),
        })
    }

    fn children_of(&self, node: &StaticNode) -> Result<Vec<StaticNode>> {
        if node.children_count == 0 {
            return Ok(Vec::new());
        }
        if let Some(cached) = self.cache.borrow().get(&node.children_offset) {
            return Ok(cached.clone());
        }

        let mut buf = vec![0u8; node.children_count as usize * RECORD_SIZE as usize];
        {
            let mut file = self.file.borrow_mut();
            file.seek(SeekFrom::Start(node.children_offset as u64))
                .map_err(PredictError::Io)?;
            file.read_exact(&mut buf).map_err(|e| map_eof(e, &self.path))?;
        }
        let children: Vec<StaticNode> = buf
            .chunks_exact(RECORD_SIZE as usize)
            .map(StaticNode::from_bytes)
            .collect();
        self.cache
            .borrow_mut()
            .insert(node.children_offset, children.clone());
        Ok(children)
    }

    /// Walks the trie, loading each level's children on first touch; `None`
    /// if the path does not exist.
    pub fn node_for(&self, prefix: &[u32]) -> Result<Option<StaticNode>> {
        let mut current = self.root;
        for &w in prefix {
            let children = self.children_of(&current)?;
            match children.iter().find(|c| c.word_id == w) {
                Some(child) => current = *child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
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

impl NgramTrie for StaticTrie {
    fn context_info(&self, path: &[u32]) -> Option<ContextInfo> {
        let node = self.node_for(path).ok()??;
        let children = self.children_of(&node).ok()?;
        Some(ContextInfo {
            backoff_weight: node.backoff_weight,
            children: children.iter().map(|c| (c.word_id, c.frequency)).collect(),
        })
    }
}

/// Serializes a [`DynamicTrie`] (after `update_probabilities`) into the
/// static file layout, level by level in BFS order so each parent's
/// children end up contiguous in the next level's block.
pub fn write_from_dynamic<P: AsRef<Path>>(path: P, trie: &DynamicTrie) -> Result<()> {
    let mut levels: Vec<Vec<(u32, &crate::ngram::dynamic_trie::DynamicNode)>> = Vec::new();
    let mut current: Vec<(u32, &crate::ngram::dynamic_trie::DynamicNode)> = {
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
    let mut offset = HEADER_SIZE + RECORD_SIZE;
    for (i, level) in levels.iter().enumerate() {
        level_offsets[i] = offset;
        offset += level.len() as u64 * RECORD_SIZE;
    }

    // For each level, compute each node's (children_offset, children_count)
    // by tracking where its children landed in the next level.
    let mut children_info: Vec<Vec<(u32, u32)>> = vec![Vec::new(); levels.len()];
    for i in 0..levels.len() {
        let mut cursor = 0u32;
        for (_, node) in &levels[i] {
            let count = node.children.len() as u32;
            let child_offset = if i + 1 < levels.len() && count > 0 {
                level_offsets[i + 1] + cursor as u64 * RECORD_SIZE
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

    let mut header = Vec::with_capacity(HEADER_SIZE as usize);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&1u32.to_le_bytes());
    header.extend_from_slice(&(trie.max_order as u32).to_le_bytes());
    header.extend_from_slice(&trie.total_unigram_count().to_le_bytes());
    writer.write_all(&header)?;

    let root_children_offset = if levels.is_empty() { 0 } else { level_offsets[0] as u32 };
    let root_record = StaticNode {
        word_id: 0,
        children_count: levels.first().map(|l| l.len()).unwrap_or(0) as u32,
        children_offset: root_children_offset,
        frequency: 0.0,
        backoff_weight: trie.root.backoff_weight,
    };
    writer.write_all(&root_record.to_bytes())?;

    for (i, level) in levels.iter().enumerate() {
        for (idx, (word_id, node)) in level.iter().enumerate() {
            let (children_offset, children_count) = children_info[i][idx];
            let record = StaticNode {
                word_id: *word_id,
                children_count,
                children_offset,
                frequency: node.frequency,
                backoff_weight: node.backoff_weight,
            };
            writer.write_all(&record.to_bytes())?;
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ngram::dynamic_trie::DynamicTrie;

    #[test]
    fn round_trip_matches_dynamic_probabilities() {
        let mut dynamic = DynamicTrie::new(2);
        dynamic.increment_path(&[1], 10);
        dynamic.increment_path(&[2], 5);
        dynamic.increment_path(&[1, 3], 4);
        dynamic.update_probabilities(&[0.0, 0.5]);

        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "predict_engine_static_trie_test_{}.bin",
            crate::time::now_unix_millis()
        ));
        write_from_dynamic(&path, &dynamic).unwrap();

        let static_trie = StaticTrie::open(&path).unwrap();
        assert_eq!(static_trie.max_order, 2);

        let dynamic_info = dynamic.context_info(&[]).unwrap();
        let static_info = static_trie.context_info(&[]).unwrap();
        for (id, freq) in dynamic_info.children {
            assert!((static_info.child_frequency(id) - freq).abs() < 1e-12);
        }

        let dynamic_ctx = dynamic.context_info(&[1]).unwrap();
        let static_ctx = static_trie.context_info(&[1]).unwrap();
        assert!((dynamic_ctx.child_frequency(3) - static_ctx.child_frequency(3)).abs() < 1e-12);

        let _ = std::fs::remove_file(&path);
    }
}
