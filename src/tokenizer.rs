//! Splits raw text into word, separator, and equivalence-class tokens.
//!
//! Concatenating every token's original textual form reproduces the input
//! exactly (after a leading UTF-8 BOM, if any, has been stripped) whenever no
//! equivalence-class matcher fires; when one fires, its normalised form
//! replaces the matched span for downstream lookups while the token still
//! remembers the original text for display/edit-plan purposes.

use crate::separator::{EquivalenceClass, Separator};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const BOM: char = '\u{FEFF}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Separator(Separator),
    Word,
    EquivalenceClass(EquivalenceClass),
}

/// A single tokenizer output. `original` is always the exact input slice the
/// token covers; `normalized` is the surface form used for dictionary
/// lookups (equal to `original` unless an equivalence-class matcher fired).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub original: String,
    pub normalized: String,
}

impl Token {
    pub fn is_word_like(&self) -> bool {
        !matches!(self.kind, TokenKind::Separator(_))
    }
}

/// A single regex-chain matcher for one equivalence class. Matchers are
/// anchored at the start of the remaining input (`^`) and tried in a fixed
/// priority order; the first one that matches wins.
struct ClassMatcher {
    class: EquivalenceClass,
    regex: Regex,
}

fn build_matchers() -> Vec<ClassMatcher> {
    // Priority order matters: more specific classes must be tried before
    // the general integer fallback.
    vec![
        ClassMatcher {
            class: EquivalenceClass::Url,
            regex: Regex::new(r"^https?://[^\s]+").expect("static url regex"),
        },
        ClassMatcher {
            class: EquivalenceClass::Email,
            regex: Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+").expect("static email regex"),
        },
        ClassMatcher {
            class: EquivalenceClass::Date,
            regex: Regex::new(r"^\d{1,4}[/-]\d{1,2}[/-]\d{1,4}").expect("static date regex"),
        },
        ClassMatcher {
            class: EquivalenceClass::Time,
            regex: Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?").expect("static time regex"),
        },
        ClassMatcher {
            class: EquivalenceClass::Percentage,
            regex: Regex::new(r"^\d+(\.\d+)?%").expect("static percent regex"),
        },
        ClassMatcher {
            class: EquivalenceClass::Decimal,
            regex: Regex::new(r"^\d+\.\d+").expect("static decimal regex"),
        },
        ClassMatcher {
            class: EquivalenceClass::Integer,
            regex: Regex::new(r"^\d+").expect("static integer regex"),
        },
    ]
}

/// Splits raw text into tokens. The matcher chain is built once per
/// instance rather than shared process-wide: there is no value in this
/// crate that must persist across `Tokenizer`s, so each one owns its own
/// compiled regex set.
pub struct Tokenizer {
    matchers: Vec<ClassMatcher>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self { matchers: build_matchers() }
    }

    /// Tokenize `text`, stripping a leading BOM if present.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let text = text.strip_prefix(BOM).unwrap_or(text);
        let mut tokens = Vec::new();
        let mut rest = text;

        while !rest.is_empty() {
            if let Some((tok, consumed)) = self.try_match_class(rest) {
                tokens.push(tok);
                rest = &rest[consumed..];
                continue;
            }

            let mut chars = rest.char_indices();
            let (_, first_ch) = chars.next().expect("rest is non-empty");
            if let Some(sep) = Separator::for_char(first_ch) {
                let len = first_ch.len_utf8();
                tokens.push(Token {
                    kind: TokenKind::Separator(sep),
                    original: rest[..len].to_string(),
                    normalized: rest[..len].to_string(),
                });
                rest = &rest[len..];
                continue;
            }

            // Maximal run of word characters.
            let mut end = first_ch.len_utf8();
            for (idx, ch) in chars {
                if Separator::for_char(ch).is_some() {
                    break;
                }
                end = idx + ch.len_utf8();
            }
            let original = rest[..end].to_string();
            // NFC-normalize for lookups: an accented word typed as a base
            // letter plus a combining mark must match the dictionary's
            // precomposed form.
            let normalized: String = original.nfc().collect();
            tokens.push(Token {
                kind: TokenKind::Word,
                original,
                normalized,
            });
            rest = &rest[end..];
        }

        tokens
    }

    fn try_match_class(&self, rest: &str) -> Option<(Token, usize)> {
        for m in &self.matchers {
            if let Some(mat) = m.regex.find(rest) {
                if mat.start() == 0 && mat.end() > 0 {
                    let original = rest[..mat.end()].to_string();
                    return Some((
                        Token {
                            kind: TokenKind::EquivalenceClass(m.class),
                            original: original.clone(),
                            normalized: original,
                        },
                        mat.end(),
                    ));
                }
            }
        }
        None
    }
}

/// Concatenate every token's original text; used to assert the round-trip
/// contract in tests and by callers rebuilding a display string.
pub fn reconstruct(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.original.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_without_matchers() {
        let text = "hello, world! how are you";
        let tokens = Tokenizer::new().tokenize(text);
        assert_eq!(reconstruct(&tokens), text);
        assert!(tokens.iter().all(|t| t.normalized == t.original));
    }

    #[test]
    fn bom_is_stripped() {
        let text = "\u{FEFF}hello";
        let tokens = Tokenizer::new().tokenize(text);
        assert_eq!(reconstruct(&tokens), "hello");
    }

    #[test]
    fn integer_is_recognised_as_equivalence_class() {
        let tokens = Tokenizer::new().tokenize("i have 42 apples");
        let classes: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::EquivalenceClass(c) => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(classes, vec![EquivalenceClass::Integer]);
    }

    #[test]
    fn percentage_outranks_decimal_and_integer() {
        let tokens = Tokenizer::new().tokenize("12.5%");
        assert_eq!(tokens.len(), 1);
        assert_eq!(
            tokens[0].kind,
            TokenKind::EquivalenceClass(EquivalenceClass::Percentage)
        );
        assert_eq!(tokens[0].original, "12.5%");
    }

    #[test]
    fn decomposed_accents_normalize_for_lookup_but_not_display() {
        // "e" + combining acute accent (U+0065 U+0301), not the precomposed
        // "é" (U+00E9).
        let decomposed = "e\u{0301}cole";
        let tokens = Tokenizer::new().tokenize(decomposed);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].original, decomposed);
        assert_eq!(tokens[0].normalized, "école");
        assert_eq!(reconstruct(&tokens), decomposed);
    }

    #[test]
    fn separators_are_single_characters() {
        let tokens = Tokenizer::new().tokenize("a,b");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, TokenKind::Separator(Separator::Comma));
    }
}
