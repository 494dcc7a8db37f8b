//! Pretrained GPT-2 family vocabularies.
//!
//! The vocabulary files are not bundled with the crate. Each preset reads
//! `encoder.json` and `vocab.bpe` from its own subdirectory of the vocab root:
//!
//! - `$BYTEPAIR_VOCAB_DIR/<preset>/` when the variable is set
//! - otherwise `vocabs/<preset>/` under the crate root
//!
//! `scripts/fetch_gpt2_vocab.sh` downloads the GPT-2 files into place.
//!
//! # Example
//!
//! ```no_run
//! use bytepair::pretrained::from_pretrained;
//!
//! let tokenizer = from_pretrained("gpt2").unwrap();
//! let tokens = tokenizer.encode("Hello, world!");
//! ```

use rustc_hash::FxHashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::tokenizer::{Tokenizer, TokenizerConfig, TokenizerError};
use super::vocab::Vocabulary;

/// Environment variable overriding the vocabulary root directory.
pub const VOCAB_DIR_ENV: &str = "BYTEPAIR_VOCAB_DIR";

pub const ENCODER_FILE: &str = "encoder.json";
pub const MERGES_FILE: &str = "vocab.bpe";

/// `<|endoftext|>`, the only special token GPT-2 defines.
pub const GPT2_END_OF_TEXT: u32 = 50256;

/// Supported pretrained vocabulary types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PretrainedVocab {
    /// OpenAI GPT-2 (also published as `r50k_base`), 50257 tokens
    Gpt2,
}

impl PretrainedVocab {
    /// Parse vocabulary name from string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gpt2" | "r50k_base" => Some(Self::Gpt2),
            _ => None,
        }
    }

    /// Get all supported vocabulary names.
    pub fn supported_names() -> &'static [&'static str] {
        &["gpt2", "r50k_base"]
    }

    /// Subdirectory of the vocab root holding this preset's files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Gpt2 => "gpt2",
        }
    }
}

/// Root directory searched for pretrained vocabularies.
pub fn vocab_root() -> PathBuf {
    vocab_root_from(std::env::var_os(VOCAB_DIR_ENV))
}

/// Vocab root for a given value of [`VOCAB_DIR_ENV`]; unset or empty means
/// the bundled `vocabs/` directory.
fn vocab_root_from(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => Path::new(env!("CARGO_MANIFEST_DIR")).join("vocabs"),
    }
}

/// Directory holding `encoder.json` and `vocab.bpe` for `vocab`.
pub fn vocab_dir(vocab: PretrainedVocab) -> PathBuf {
    vocab_root().join(vocab.dir_name())
}

/// Create a pretrained tokenizer by vocabulary name.
pub fn from_pretrained(name: &str) -> Result<Tokenizer, TokenizerError> {
    let vocab = PretrainedVocab::from_name(name).ok_or_else(|| {
        TokenizerError::UnknownPretrained(format!(
            "{}. Supported: {}",
            name,
            PretrainedVocab::supported_names().join(", ")
        ))
    })?;

    from_vocab(vocab)
}

/// Create a pretrained tokenizer from vocabulary enum.
pub fn from_vocab(vocab: PretrainedVocab) -> Result<Tokenizer, TokenizerError> {
    from_dir(vocab, vocab_dir(vocab))
}

/// Create a pretrained tokenizer from files in an explicit directory.
pub fn from_dir(vocab: PretrainedVocab, dir: impl AsRef<Path>) -> Result<Tokenizer, TokenizerError> {
    let dir = dir.as_ref();
    tracing::debug!(preset = vocab.dir_name(), dir = %dir.display(), "loading pretrained vocabulary");

    let vocabulary = Vocabulary::load_files(dir.join(ENCODER_FILE), dir.join(MERGES_FILE))?;
    let config = TokenizerConfig {
        special_tokens: special_tokens(vocab),
        ..TokenizerConfig::default()
    };
    Tokenizer::with_config(vocabulary, config)
}

/// Get the EOS (end of sequence) token ID for a vocabulary.
pub fn eos_token_id(vocab: PretrainedVocab) -> u32 {
    match vocab {
        PretrainedVocab::Gpt2 => GPT2_END_OF_TEXT,
    }
}

/// Get the special tokens map for a vocabulary.
pub fn special_tokens(vocab: PretrainedVocab) -> FxHashMap<String, u32> {
    match vocab {
        PretrainedVocab::Gpt2 => gpt2_special_tokens(),
    }
}

pub fn gpt2_special_tokens() -> FxHashMap<String, u32> {
    let mut special = FxHashMap::default();
    special.insert("<|endoftext|>".to_string(), GPT2_END_OF_TEXT);
    special
}

impl Tokenizer {
    /// Shorthand for [`from_pretrained`].
    pub fn from_pretrained(name: &str) -> Result<Self, TokenizerError> {
        from_pretrained(name)
    }
}
