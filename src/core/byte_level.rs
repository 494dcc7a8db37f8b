//! ByteLevel encoding/decoding for GPT-2 style BPE.
//!
//! GPT-2 vocabularies are keyed by strings, not bytes. To make every possible
//! byte sequence representable, each raw byte (0-255) is first mapped to a
//! unique printable Unicode character, and BPE runs over those characters.
//!
//! # Mapping Strategy
//!
//! Printable ASCII and Latin-1 characters map to themselves; every other byte
//! is assigned the next free code point starting at U+0100, in ascending byte
//! order:
//!
//! - Bytes 33-126 (`!` to `~`): map to themselves
//! - Bytes 161-172 (`¡` to `¬`): map to themselves
//! - Bytes 174-255 (`®` to `ÿ`): map to themselves
//! - Other bytes (0-32, 127-160, 173): map to U+0100..=U+0143
//!
//! Token ids are only meaningful if every implementation agrees on this table,
//! so it is computed at compile time and never configurable.
//!
//! # Example
//!
//! ```
//! use bytepair::core::byte_level::byte_level_encode;
//!
//! // Space (0x20) maps to 'Ġ' (U+0120)
//! assert_eq!(byte_level_encode(b" hello"), "\u{120}hello");
//! ```

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Number of code points assigned outside the self-mapped ranges.
const SHIFTED_BYTES: usize = 68;

const fn is_self_mapped(b: u8) -> bool {
    matches!(b, 33..=126 | 161..=172 | 174..=255)
}

const fn build_byte_table() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut next = 0x100u32;
    let mut b = 0usize;
    while b < 256 {
        let cp = if is_self_mapped(b as u8) {
            b as u32
        } else {
            let cp = next;
            next += 1;
            cp
        };
        table[b] = match char::from_u32(cp) {
            Some(ch) => ch,
            None => panic!("byte-level table contains an invalid code point"),
        };
        b += 1;
    }
    assert!(next == 0x100 + SHIFTED_BYTES as u32);
    table
}

/// Byte to Unicode character mapping (256 entries).
static BYTE_TO_CHAR: [char; 256] = build_byte_table();

/// Unicode character to byte mapping (reverse of BYTE_TO_CHAR).
static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// Get the ByteLevel character for a byte value. Total over `u8`.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Get the byte value for a ByteLevel character.
///
/// Returns `None` for characters outside the 256-character alphabet.
#[inline]
pub fn char_to_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(&ch).copied()
}

/// Check if a character is part of the ByteLevel alphabet.
#[inline]
pub fn is_byte_level_char(ch: char) -> bool {
    CHAR_TO_BYTE.contains_key(&ch)
}

/// Encode a byte slice using ByteLevel encoding.
///
/// Each byte becomes exactly one character of the output string.
#[inline]
pub fn byte_level_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| byte_to_char(b)).collect()
}

/// Decode a ByteLevel-encoded string back to raw bytes.
///
/// Returns `None` if the string contains any character outside the alphabet.
#[inline]
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(char_to_byte).collect()
}

/// Decode a ByteLevel-encoded string, dropping characters outside the alphabet.
#[inline]
pub fn byte_level_decode_lossy(text: &str) -> Vec<u8> {
    text.chars().filter_map(char_to_byte).collect()
}

/// Append the raw bytes of a ByteLevel-encoded string to `out`.
///
/// Returns the first character that has no byte mapping, leaving `out`
/// holding the bytes decoded before it.
pub(crate) fn byte_level_decode_into(text: &str, out: &mut Vec<u8>) -> Result<(), char> {
    for ch in text.chars() {
        out.push(char_to_byte(ch).ok_or(ch)?);
    }
    Ok(())
}
