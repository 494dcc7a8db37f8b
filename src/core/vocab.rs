//! Vocabulary loading for GPT-2 style byte-level BPE.
//!
//! A vocabulary is made of two resources:
//!
//! - an **encoder** table: a JSON object mapping token strings (in ByteLevel
//!   form) to integer ids, e.g. `{"!": 0, "\"": 1, ..., "Ġthe": 262}`
//! - a **merges** table: UTF-8 text with one merge rule per line, two
//!   whitespace-separated symbols, ordered by ascending rank. The first line
//!   is a version header and is always skipped.
//!
//! # Example Merges
//!
//! ```text
//! #version: 0.2
//! Ġ t
//! Ġ a
//! h e
//! ```
//!
//! Here `Ġ t` has rank 0 (merged first), `Ġ a` rank 1 and `h e` rank 2.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading vocabulary resources.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("IO error reading {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid encoder table: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Merges table is not valid UTF-8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
    #[error("Invalid merge rule on line {line}: {content:?}")]
    MergeLine { line: usize, content: String },
}

/// Parse the encoder table (JSON object of token string to id).
pub fn parse_encoder(data: &[u8]) -> Result<FxHashMap<String, u32>, VocabError> {
    Ok(serde_json::from_slice(data)?)
}

/// Parse the merges table into pairs, in rank order.
///
/// The first line is a header and is skipped unconditionally. Blank lines are
/// ignored and do not consume a rank. Every other line must hold exactly two
/// whitespace-separated symbols.
pub fn parse_merges(data: &[u8]) -> Result<Vec<(String, String)>, VocabError> {
    let text = std::str::from_utf8(data)?;
    let mut merges = Vec::new();

    for (idx, line) in text.split('\n').enumerate().skip(1) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(left), Some(right), None) => merges.push((left.to_string(), right.to_string())),
            _ => {
                return Err(VocabError::MergeLine {
                    line: idx + 1,
                    content: line.to_string(),
                })
            }
        }
    }

    Ok(merges)
}

/// Build a decoder map (token ID → token string) from an encoder map.
///
/// If two strings share an id, whichever is visited last wins.
pub fn build_decoder(encoder: &FxHashMap<String, u32>) -> FxHashMap<u32, String> {
    encoder.iter().map(|(k, v)| (*v, k.clone())).collect()
}

fn read(path: &Path) -> Result<Vec<u8>, VocabError> {
    std::fs::read(path).map_err(|source| VocabError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

/// Read-only token tables shared by every stage of the tokenizer.
///
/// Built once and never mutated afterwards; share it with `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    encoder: FxHashMap<String, u32>,
    decoder: FxHashMap<u32, String>,
    /// left symbol → right symbol → rank, so lookups need no allocation.
    ranks: FxHashMap<String, FxHashMap<String, u32>>,
    merges_len: usize,
}

impl Vocabulary {
    /// An empty vocabulary: encodes nothing, decodes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a vocabulary from an encoder map and merge rules in rank order.
    ///
    /// A pair listed more than once keeps the rank of its last occurrence.
    pub fn from_parts(
        encoder: FxHashMap<String, u32>,
        merges: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let decoder = build_decoder(&encoder);
        let mut ranks: FxHashMap<String, FxHashMap<String, u32>> = FxHashMap::default();
        let mut merges_len = 0;
        for (rank, (left, right)) in merges.into_iter().enumerate() {
            ranks.entry(left).or_default().insert(right, rank as u32);
            merges_len += 1;
        }

        Self {
            encoder,
            decoder,
            ranks,
            merges_len,
        }
    }

    /// Load a vocabulary from raw encoder (JSON) and merges (text) bytes.
    pub fn load(encoder_data: &[u8], merges_data: &[u8]) -> Result<Self, VocabError> {
        let encoder = parse_encoder(encoder_data)?;
        let merges = parse_merges(merges_data)?;
        let vocab = Self::from_parts(encoder, merges);
        tracing::debug!(
            tokens = vocab.len(),
            merges = vocab.merges_len(),
            "loaded vocabulary"
        );
        Ok(vocab)
    }

    /// Load a vocabulary from an encoder file and a merges file.
    pub fn load_files(
        encoder_path: impl AsRef<Path>,
        merges_path: impl AsRef<Path>,
    ) -> Result<Self, VocabError> {
        let encoder_data = read(encoder_path.as_ref())?;
        let merges_data = read(merges_path.as_ref())?;
        Self::load(&encoder_data, &merges_data)
    }

    /// Like [`Vocabulary::load`], but degrades to an empty vocabulary on failure.
    pub fn load_or_empty(encoder_data: &[u8], merges_data: &[u8]) -> Self {
        Self::load(encoder_data, merges_data).unwrap_or_else(|e| degrade(&e))
    }

    /// Like [`Vocabulary::load_files`], but degrades to an empty vocabulary on failure.
    pub fn load_files_or_empty(
        encoder_path: impl AsRef<Path>,
        merges_path: impl AsRef<Path>,
    ) -> Self {
        Self::load_files(encoder_path, merges_path).unwrap_or_else(|e| degrade(&e))
    }

    /// Merge priority of `(left, right)`; lower merges first.
    #[inline]
    pub fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.ranks.get(left)?.get(right).copied()
    }

    #[inline]
    pub fn id_of(&self, symbol: &str) -> Option<u32> {
        self.encoder.get(symbol).copied()
    }

    #[inline]
    pub fn symbol_of(&self, id: u32) -> Option<&str> {
        self.decoder.get(&id).map(String::as_str)
    }

    /// Number of token strings in the encoder table.
    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// Number of merge rules read (duplicates included).
    pub fn merges_len(&self) -> usize {
        self.merges_len
    }

    pub fn max_token_id(&self) -> Option<u32> {
        self.decoder.keys().max().copied()
    }

    /// Get the encoder map (token string -> ID).
    pub fn encoder(&self) -> &FxHashMap<String, u32> {
        &self.encoder
    }

    /// Get the decoder map (token ID -> token string).
    pub fn decoder(&self) -> &FxHashMap<u32, String> {
        &self.decoder
    }
}

fn degrade(err: &VocabError) -> Vocabulary {
    tracing::warn!(error = %err, "failed to load vocabulary, continuing with empty tables");
    Vocabulary::empty()
}
