//! Closed tables for separators, equivalence classes, and reserved tags.
//!
//! Every character in input text either belongs to exactly one [`Separator`]
//! or is a word character. The byte used to persist a `Separator` or
//! [`EquivalenceClass`] id is part of the on-disk file formats and
//! must never change across versions — new variants are appended, existing
//! ones are never renumbered.

/// Non-word characters recognised by the tokenizer.
///
/// `identity_byte()` is the stable, persisted discriminant; `is_sentence_terminating()`
/// marks separators after which a new sentence is considered to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Separator {
    Space,
    Newline,
    Tab,
    Period,
    QuestionMark,
    ExclamationMark,
    Comma,
    Semicolon,
    Colon,
    Apostrophe,
    Quote,
    Hyphen,
    OpenParen,
    CloseParen,
    Other,
}

impl Separator {
    /// Stable byte used in persisted file formats. Never renumber existing
    /// variants; append new ones at the end.
    pub fn identity_byte(self) -> u8 {
        match self {
            Separator::Space => 0,
            Separator::Newline => 1,
            Separator::Tab => 2,
            Separator::Period => 3,
            Separator::QuestionMark => 4,
            Separator::ExclamationMark => 5,
            Separator::Comma => 6,
            Separator::Semicolon => 7,
            Separator::Colon => 8,
            Separator::Apostrophe => 9,
            Separator::Quote => 10,
            Separator::Hyphen => 11,
            Separator::OpenParen => 12,
            Separator::CloseParen => 13,
            Separator::Other => 14,
        }
    }

    pub fn from_identity_byte(b: u8) -> Option<Self> {
        Some(match b {
            0 => Separator::Space,
            1 => Separator::Newline,
            2 => Separator::Tab,
            3 => Separator::Period,
            4 => Separator::QuestionMark,
            5 => Separator::ExclamationMark,
            6 => Separator::Comma,
            7 => Separator::Semicolon,
            8 => Separator::Colon,
            9 => Separator::Apostrophe,
            10 => Separator::Quote,
            11 => Separator::Hyphen,
            12 => Separator::OpenParen,
            13 => Separator::CloseParen,
            14 => Separator::Other,
            _ => return None,
        })
    }

    /// Whether a sentence is considered finished after this separator.
    pub fn is_sentence_terminating(self) -> bool {
        matches!(
            self,
            Separator::Period | Separator::QuestionMark | Separator::ExclamationMark
        )
    }

    /// Whether this separator is the apostrophe class used by the
    /// "may insert trailing space" and compound-candidate rules.
    pub fn is_apostrophe_class(self) -> bool {
        matches!(self, Separator::Apostrophe)
    }

    /// Map a character to its separator, if it is not a word character.
    pub fn for_char(ch: char) -> Option<Self> {
        Some(match ch {
            ' ' => Separator::Space,
            '\n' | '\r' => Separator::Newline,
            '\t' => Separator::Tab,
            '.' => Separator::Period,
            '?' => Separator::QuestionMark,
            '!' => Separator::ExclamationMark,
            ',' => Separator::Comma,
            ';' => Separator::Semicolon,
            ':' => Separator::Colon,
            '\'' | '\u{2019}' => Separator::Apostrophe,
            '"' | '\u{201C}' | '\u{201D}' => Separator::Quote,
            '-' | '\u{2013}' | '\u{2014}' => Separator::Hyphen,
            '(' | '[' | '{' => Separator::OpenParen,
            ')' | ']' | '}' => Separator::CloseParen,
            c if c.is_whitespace() => Separator::Other,
            c if c.is_ascii_punctuation() => Separator::Other,
            _ => return None,
        })
    }
}

/// Multi-token constructs recognised during tokenization (dates,
/// percentages, integers, ...). Each class is represented in the dictionary
/// by a synthetic word whose id equals `dictionary_id()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquivalenceClass {
    Integer,
    Decimal,
    Percentage,
    Date,
    Time,
    Url,
    Email,
}

impl EquivalenceClass {
    pub const ALL: [EquivalenceClass; 7] = [
        EquivalenceClass::Integer,
        EquivalenceClass::Decimal,
        EquivalenceClass::Percentage,
        EquivalenceClass::Date,
        EquivalenceClass::Time,
        EquivalenceClass::Url,
        EquivalenceClass::Email,
    ];

    /// Stable class id. Equals the dictionary id reserved for this class's
    /// synthetic word (see [`crate::dictionary::Tag::RESERVED_COUNT`]).
    pub fn class_id(self) -> u32 {
        match self {
            EquivalenceClass::Integer => 0,
            EquivalenceClass::Decimal => 1,
            EquivalenceClass::Percentage => 2,
            EquivalenceClass::Date => 3,
            EquivalenceClass::Time => 4,
            EquivalenceClass::Url => 5,
            EquivalenceClass::Email => 6,
        }
    }

    pub fn dictionary_id(self) -> u32 {
        crate::dictionary::Tag::RESERVED_COUNT + self.class_id()
    }

    /// Synthetic surface form stored in the dictionary for this class.
    pub fn synthetic_surface(self) -> &'static str {
        match self {
            EquivalenceClass::Integer => "<INTEGER>",
            EquivalenceClass::Decimal => "<DECIMAL>",
            EquivalenceClass::Percentage => "<PERCENT>",
            EquivalenceClass::Date => "<DATE>",
            EquivalenceClass::Time => "<TIME>",
            EquivalenceClass::Url => "<URL>",
            EquivalenceClass::Email => "<EMAIL>",
        }
    }
}

/// Reserved dictionary ids occupying the lowest ids; never written to the
/// user overlay file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Unknown,
    SentenceStart,
    SentenceEnd,
}

impl Tag {
    /// Number of reserved tag ids; equivalence classes are numbered
    /// immediately after these.
    pub const RESERVED_COUNT: u32 = 3;

    pub fn dictionary_id(self) -> u32 {
        match self {
            Tag::Unknown => 0,
            Tag::SentenceStart => 1,
            Tag::SentenceEnd => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Unknown => "UNKNOWN",
            Tag::SentenceStart => "SENTENCE-START",
            Tag::SentenceEnd => "SENTENCE-END",
        }
    }

    pub const ALL: [Tag; 3] = [Tag::Unknown, Tag::SentenceStart, Tag::SentenceEnd];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_byte_roundtrip() {
        for b in 0..=14u8 {
            let sep = Separator::from_identity_byte(b).unwrap();
            assert_eq!(sep.identity_byte(), b);
        }
        assert!(Separator::from_identity_byte(255).is_none());
    }

    #[test]
    fn sentence_terminators() {
        assert!(Separator::Period.is_sentence_terminating());
        assert!(!Separator::Comma.is_sentence_terminating());
    }

    #[test]
    fn tag_and_class_ids_do_not_collide() {
        let mut ids: Vec<u32> = Tag::ALL.iter().map(|t| t.dictionary_id()).collect();
        ids.extend(EquivalenceClass::ALL.iter().map(|c| c.dictionary_id()));
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        ids.sort_unstable();
        assert_eq!(ids, (0..ids.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_is_id_zero() {
        assert_eq!(Tag::Unknown.dictionary_id(), 0);
    }
}
