//! The tagged-variant `Word` type.
//!
//! Rather than modelling tag/equivalence-class/simple/user words as a class
//! hierarchy, every variant shares one header of mutable fields and carries
//! only the data specific to its kind.

use serde::{Deserialize, Serialize};

/// Fields every word carries regardless of kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WordHeader {
    /// Multiplicative bias applied to this word's score at prediction time.
    pub prob_factor: f32,
    pub force_valid: bool,
    pub force_invalid: bool,
    /// Set by `putUserWord`/`incrementUserCount` and other user-triggered edits.
    pub user_dirty: bool,
    /// Set by any write that changes a non-User word.
    pub system_dirty: bool,
}

impl Default for WordHeader {
    fn default() -> Self {
        Self {
            prob_factor: 1.0,
            force_valid: false,
            force_invalid: false,
            user_dirty: false,
            system_dirty: false,
        }
    }
}

/// The 1-byte type discriminant persisted in word-dictionary records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordTypeByte {
    Tag = 0,
    EquivalenceClass = 1,
    Simple = 2,
    User = 3,
}

impl WordTypeByte {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => WordTypeByte::Tag,
            1 => WordTypeByte::EquivalenceClass,
            2 => WordTypeByte::Simple,
            3 => WordTypeByte::User,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WordKind {
    /// One per `Tag`; no surface form besides the tag name.
    Tag { tag: crate::separator::Tag },
    /// One per `EquivalenceClass`.
    EquivalenceClass { class: crate::separator::EquivalenceClass },
    /// Learned from training; surface is lowercase unless case is
    /// distinguishing.
    Simple { surface: String },
    /// Added at prediction time; tracks usage for validity gating.
    User {
        surface: String,
        usage_count: u32,
        last_use_unix_millis: u64,
    },
}

impl WordKind {
    pub fn type_byte(&self) -> WordTypeByte {
        match self {
            WordKind::Tag { .. } => WordTypeByte::Tag,
            WordKind::EquivalenceClass { .. } => WordTypeByte::EquivalenceClass,
            WordKind::Simple { .. } => WordTypeByte::Simple,
            WordKind::User { .. } => WordTypeByte::User,
        }
    }

    /// Surface form used for dictionary indexing and display. Tag words use
    /// their tag name; equivalence-class words use their synthetic surface.
    pub fn surface(&self) -> &str {
        match self {
            WordKind::Tag { tag } => tag.name(),
            WordKind::EquivalenceClass { class } => class.synthetic_surface(),
            WordKind::Simple { surface } | WordKind::User { surface, .. } => surface,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, WordKind::User { .. })
    }

    /// Tag and equivalence-class words are never written to the user
    /// overlay file.
    pub fn is_persistable_to_overlay(&self) -> bool {
        matches!(self, WordKind::Simple { .. } | WordKind::User { .. })
    }
}

/// A dictionary entry: a stable id, the shared mutable header, and its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: u32,
    pub header: WordHeader,
    pub kind: WordKind,
}

impl Word {
    pub fn new(id: u32, kind: WordKind) -> Self {
        Self {
            id,
            header: WordHeader::default(),
            kind,
        }
    }

    pub fn surface(&self) -> &str {
        self.kind.surface()
    }

    /// Mark this word dirty from the appropriate side: user edits dirty
    /// User words via `user_dirty`; any write to a non-User word sets
    /// `system_dirty`.
    pub fn mark_dirty(&mut self) {
        if self.kind.is_user() {
            self.header.user_dirty = true;
        } else {
            self.header.system_dirty = true;
        }
    }

    pub fn increment_user_count(&mut self) {
        if let WordKind::User {
            usage_count,
            last_use_unix_millis,
            ..
        } = &mut self.kind
        {
            *usage_count = usage_count.saturating_add(1);
            *last_use_unix_millis = crate::time::now_unix_millis();
            self.header.user_dirty = true;
        }
    }
}
