//! Static (on-disk) and dynamic (in-memory) n-gram tries, and the shared
//! lookup surface the probability engine drives them through.

pub mod context;
pub mod dynamic_trie;
pub mod static_trie;

pub use context::{ContextInfo, NgramTrie};
pub use dynamic_trie::{read_dynamic, write_dynamic, DynamicTrie, PruneMode};
pub use static_trie::{write_from_dynamic, StaticTrie};
