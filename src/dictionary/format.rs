//! Binary layout for the word-dictionary file.
//!
//! `[UTF-length-prefixed identifier][4-byte id-generator state][repeated
//! word records]`. Each record is `[1-byte type][4-byte id][type-specific
//! payload]`. Tag and equivalence-class words are reconstructed from the
//! closed tables on every load and are never written here — only `Simple`
//! and `User` words round-trip through this format.

use crate::dictionary::word::{Word, WordKind, WordTypeByte};
use crate::error::{PredictError, Result};
use std::io::{Read, Write};
use std::path::Path;

fn write_string<W: Write>(w: &mut W, s: &str) -> std::io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u32).to_le_bytes())?;
    w.write_all(bytes)
}

fn read_string<R: Read>(r: &mut R, path: &Path) -> Result<String> {
    let len = read_u32(r, path)?;
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| PredictError::CorruptFile {
        path: path.to_path_buf(),
        reason: format!("invalid utf-8 string: {e}"),
    })
}

fn read_u32<R: Read>(r: &mut R, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| map_eof(e, path))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| map_eof(e, path))?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32<R: Read>(r: &mut R, path: &Path) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| map_eof(e, path))?;
    Ok(f32::from_le_bytes(buf))
}

fn read_bool<R: Read>(r: &mut R, path: &Path) -> Result<bool> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|e| map_eof(e, path))?;
    Ok(buf[0] != 0)
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

/// Write `identifier`, `next_id`, and every word for which `include`
/// returns true, in the binary layout described above.
pub fn write_words<W: Write>(
    w: &mut W,
    identifier: &str,
    next_id: u32,
    words: &[Option<Word>],
    mut include: impl FnMut(&Word) -> bool,
) -> std::io::Result<()> {
    write_string(w, identifier)?;
    w.write_all(&next_id.to_le_bytes())?;
    for word in words.iter().flatten() {
        if !word.kind.is_persistable_to_overlay() || !include(word) {
            continue;
        }
        w.write_all(&[word.kind.type_byte() as u8])?;
        w.write_all(&word.id.to_le_bytes())?;
        match &word.kind {
            WordKind::Simple { surface } => {
                write_string(w, surface)?;
            }
            WordKind::User {
                surface,
                usage_count,
                last_use_unix_millis,
            } => {
                write_string(w, surface)?;
                w.write_all(&usage_count.to_le_bytes())?;
                w.write_all(&last_use_unix_millis.to_le_bytes())?;
            }
            WordKind::Tag { .. } | WordKind::EquivalenceClass { .. } => unreachable!(
                "is_persistable_to_overlay() already filtered these out"
            ),
        }
        w.write_all(&word.header.prob_factor.to_le_bytes())?;
        w.write_all(&[word.header.force_valid as u8])?;
        w.write_all(&[word.header.force_invalid as u8])?;
        w.write_all(&[word.header.user_dirty as u8])?;
        w.write_all(&[word.header.system_dirty as u8])?;
    }
    Ok(())
}

/// A record read back from a words file, not yet merged into a dictionary.
pub struct LoadedWords {
    pub identifier: String,
    pub next_id: u32,
    pub words: Vec<Word>,
}

pub fn read_words<R: Read>(r: &mut R, path: &Path) -> Result<LoadedWords> {
    let identifier = read_string(r, path)?;
    let next_id = read_u32(r, path)?;
    let mut words = Vec::new();

    loop {
        let mut type_byte = [0u8; 1];
        match r.read(&mut type_byte) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => return Err(PredictError::Io(e)),
        }
        let kind_byte = WordTypeByte::from_byte(type_byte[0]).ok_or_else(|| {
            PredictError::CorruptFile {
                path: path.to_path_buf(),
                reason: format!("unknown word type byte {}", type_byte[0]),
            }
        })?;
        let id = read_u32(r, path)?;
        let kind = match kind_byte {
            WordTypeByte::Simple => WordKind::Simple {
                surface: read_string(r, path)?,
            },
            WordTypeByte::User => {
                let surface = read_string(r, path)?;
                let usage_count = read_u32(r, path)?;
                let last_use_unix_millis = read_u64(r, path)?;
                WordKind::User {
                    surface,
                    usage_count,
                    last_use_unix_millis,
                }
            }
            WordTypeByte::Tag | WordTypeByte::EquivalenceClass => {
                return Err(PredictError::CorruptFile {
                    path: path.to_path_buf(),
                    reason: "tag/equivalence-class records are not valid in a words file"
                        .to_string(),
                })
            }
        };
        let prob_factor = read_f32(r, path)?;
        let force_valid = read_bool(r, path)?;
        let force_invalid = read_bool(r, path)?;
        let user_dirty = read_bool(r, path)?;
        let system_dirty = read_bool(r, path)?;

        let mut word = Word::new(id, kind);
        word.header.prob_factor = prob_factor;
        word.header.force_valid = force_valid;
        word.header.force_invalid = force_invalid;
        word.header.user_dirty = user_dirty;
        word.header.system_dirty = system_dirty;
        words.push(word);
    }

    Ok(LoadedWords {
        identifier,
        next_id,
        words,
    })
}
