use aho_corasick::AhoCorasick;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::bpe::{BpeEngine, SYMBOL_SEPARATOR};
use super::byte_level::{
    byte_level_decode_into, byte_level_decode_lossy, byte_level_encode, char_to_byte,
};
use super::cache::CacheConfig;
use super::pretokenize::Pretokenizer;
use super::vocab::{VocabError, Vocabulary};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] fancy_regex::Error),
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasickError(#[from] aho_corasick::BuildError),
    #[error("Invalid tokenizer config: {0}")]
    ConfigError(#[from] serde_json::Error),
    #[error("Symbol {0:?} has no token id")]
    UnknownSymbol(String),
    #[error("Unknown token id: {0}")]
    UnknownTokenId(u32),
    #[error("Character {0:?} is not part of the byte-level alphabet")]
    UnmappedChar(char),
    #[error("Decoding error: invalid UTF-8")]
    Utf8Error,
    #[error("Unknown pretrained model: {0}")]
    UnknownPretrained(String),
    #[error("Special token {0} is an empty string")]
    EmptySpecialToken(u32),
}

/// Construction options for [`Tokenizer`].
///
/// Deserializable so hosts can keep it next to their own settings:
///
/// ```json
/// { "cache": { "lru": { "capacity": 1024 } }, "special_tokens": { "<|endoftext|>": 50256 } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub cache: CacheConfig,
    pub special_tokens: FxHashMap<String, u32>,
}

impl TokenizerConfig {
    pub fn from_json(json: &str) -> Result<Self, TokenizerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_special_token(mut self, token: impl Into<String>, id: u32) -> Self {
        self.special_tokens.insert(token.into(), id);
        self
    }
}

/// Result of [`Tokenizer::encode_with_report`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    /// Merged symbols with no token id, in the order they were dropped.
    pub unknown_symbols: Vec<String>,
}

impl Encoding {
    /// True if no symbol was dropped, so decoding restores the input.
    pub fn is_lossless(&self) -> bool {
        self.unknown_symbols.is_empty()
    }
}

/// Byte-level BPE tokenizer for GPT-2 style vocabularies.
///
/// `encode` runs pretokenization, ByteLevel mapping, BPE merging and id lookup;
/// `decode` runs the inverse chain.
///
/// # Unknown symbols and ids
///
/// Symbols the vocabulary has no id for are dropped by [`encode`](Self::encode),
/// and unknown ids are skipped by [`decode`](Self::decode). With a complete
/// byte-level vocabulary this never happens, since every byte has a token.
/// Use [`encode_with_report`](Self::encode_with_report),
/// [`encode_strict`](Self::encode_strict) or [`decode_strict`](Self::decode_strict)
/// to observe drops.
///
/// # Thread safety
///
/// The vocabulary is immutable and shared; the chunk cache is internally
/// locked, so a `Tokenizer` can be shared across threads. Batch methods
/// parallelize across inputs with Rayon.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    vocab: Arc<Vocabulary>,
    engine: BpeEngine,
    pretokenizer: Pretokenizer,
    special_tokens: FxHashMap<String, u32>,
    special_tokens_decoder: FxHashMap<u32, String>,
    special_token_strings: Vec<String>,
    special_matcher: Option<AhoCorasick>,
}

impl Tokenizer {
    /// Create a tokenizer with the default cache and no special tokens.
    pub fn new(vocab: Vocabulary) -> Result<Self, TokenizerError> {
        Self::with_config(vocab, TokenizerConfig::default())
    }

    pub fn with_config(vocab: Vocabulary, config: TokenizerConfig) -> Result<Self, TokenizerError> {
        let vocab = Arc::new(vocab);
        let engine = BpeEngine::with_cache(Arc::clone(&vocab), config.cache.build());
        let pretokenizer = Pretokenizer::new()?;

        let special_tokens = config.special_tokens;
        // An empty pattern matches inside multi-byte characters.
        if let Some(&id) = special_tokens.get("") {
            return Err(TokenizerError::EmptySpecialToken(id));
        }
        let special_tokens_decoder: FxHashMap<u32, String> = special_tokens
            .iter()
            .map(|(k, v)| (*v, k.clone()))
            .collect();

        // Longest first, so overlapping specials resolve to the longer token.
        let mut special_token_strings: Vec<String> = special_tokens.keys().cloned().collect();
        special_token_strings.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let special_matcher = if special_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(aho_corasick::MatchKind::LeftmostFirst)
                    .build(&special_token_strings)?,
            )
        };

        Ok(Self {
            vocab,
            engine,
            pretokenizer,
            special_tokens,
            special_tokens_decoder,
            special_token_strings,
            special_matcher,
        })
    }

    /// Create a tokenizer from raw encoder (JSON) and merges bytes.
    pub fn from_bytes(encoder_data: &[u8], merges_data: &[u8]) -> Result<Self, TokenizerError> {
        Self::new(Vocabulary::load(encoder_data, merges_data)?)
    }

    /// Create a tokenizer from an encoder file and a merges file.
    pub fn from_files(
        encoder_path: impl AsRef<Path>,
        merges_path: impl AsRef<Path>,
    ) -> Result<Self, TokenizerError> {
        Self::new(Vocabulary::load_files(encoder_path, merges_path)?)
    }

    /// Like [`from_bytes`](Self::from_bytes), but a resource that fails to load
    /// yields a tokenizer over an empty vocabulary instead of an error.
    pub fn from_bytes_or_empty(
        encoder_data: &[u8],
        merges_data: &[u8],
    ) -> Result<Self, TokenizerError> {
        Self::new(Vocabulary::load_or_empty(encoder_data, merges_data))
    }

    /// Like [`from_files`](Self::from_files), degrading to an empty vocabulary.
    pub fn from_files_or_empty(
        encoder_path: impl AsRef<Path>,
        merges_path: impl AsRef<Path>,
    ) -> Result<Self, TokenizerError> {
        Self::new(Vocabulary::load_files_or_empty(encoder_path, merges_path))
    }

    /// BPE-encode one pretokenized chunk, passing each symbol's lookup to `emit`.
    fn encode_chunk(&self, chunk: &str, emit: &mut impl FnMut(&str, Option<u32>)) {
        let byte_encoded = byte_level_encode(chunk.as_bytes());
        let merged = self.engine.merge(&byte_encoded);
        for symbol in merged.split(SYMBOL_SEPARATOR) {
            emit(symbol, self.vocab.id_of(symbol));
        }
    }

    fn encode_ordinary(&self, text: &str, emit: &mut impl FnMut(&str, Option<u32>)) {
        for chunk in self.pretokenizer.split(text) {
            self.encode_chunk(chunk, emit);
        }
    }

    /// Encode text to token IDs (special tokens in the input are plain text).
    ///
    /// Symbols without a token id are dropped.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut ids = Vec::with_capacity(text.len() / 3 + 1);
        self.encode_ordinary(text, &mut |_, id| ids.extend(id));
        ids
    }

    /// Encode text, recording every symbol that had no token id.
    pub fn encode_with_report(&self, text: &str) -> Encoding {
        let mut encoding = Encoding::default();
        self.encode_ordinary(text, &mut |symbol, id| match id {
            Some(id) => encoding.ids.push(id),
            None => encoding.unknown_symbols.push(symbol.to_string()),
        });
        encoding
    }

    /// Encode text, failing on the first symbol without a token id.
    pub fn encode_strict(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let Encoding {
            ids,
            unknown_symbols,
        } = self.encode_with_report(text);
        match unknown_symbols.into_iter().next() {
            Some(symbol) => Err(TokenizerError::UnknownSymbol(symbol)),
            None => Ok(ids),
        }
    }

    /// Encode text with special token handling.
    ///
    /// Configured special tokens in the input are emitted directly without BPE.
    pub fn encode_with_special(&self, text: &str) -> Vec<u32> {
        let Some(ref special_matcher) = self.special_matcher else {
            return self.encode(text);
        };

        let mut result = Vec::new();
        let mut last_end = 0;

        for m in special_matcher.find_iter(text) {
            if m.start() > last_end {
                result.extend(self.encode(&text[last_end..m.start()]));
            }

            let token_str = &self.special_token_strings[m.pattern().as_usize()];
            if let Some(&id) = self.special_tokens.get(token_str) {
                result.push(id);
            }

            last_end = m.end();
        }

        if last_end < text.len() {
            result.extend(self.encode(&text[last_end..]));
        }

        result
    }

    /// Raw bytes of a single token, or `None` for an unknown id.
    ///
    /// Vocabulary tokens are ByteLevel-decoded; characters outside the
    /// alphabet are dropped. Special tokens missing from the vocabulary
    /// yield their literal text.
    pub fn token_bytes(&self, id: u32) -> Option<Vec<u8>> {
        if let Some(symbol) = self.vocab.symbol_of(id) {
            Some(byte_level_decode_lossy(symbol))
        } else {
            self.special_tokens_decoder
                .get(&id)
                .map(|s| s.as_bytes().to_vec())
        }
    }

    /// Decode token IDs back to bytes, skipping unknown ids.
    pub fn decode_bytes(&self, tokens: &[u32]) -> Vec<u8> {
        let mut result = Vec::with_capacity(tokens.len() * 4);

        for &token in tokens {
            if let Some(symbol) = self.vocab.symbol_of(token) {
                result.extend(symbol.chars().filter_map(char_to_byte));
            } else if let Some(special) = self.special_tokens_decoder.get(&token) {
                result.extend_from_slice(special.as_bytes());
            }
        }

        result
    }

    /// Decode token IDs to a string.
    ///
    /// Unknown ids are skipped. If the resulting bytes are not valid UTF-8 the
    /// whole result is the empty string.
    pub fn decode(&self, tokens: &[u32]) -> String {
        String::from_utf8(self.decode_bytes(tokens)).unwrap_or_default()
    }

    /// Decode token IDs to a string, replacing invalid UTF-8 with U+FFFD.
    pub fn decode_lossy(&self, tokens: &[u32]) -> String {
        String::from_utf8_lossy(&self.decode_bytes(tokens)).into_owned()
    }

    /// Decode token IDs, failing on unknown ids, foreign characters in a
    /// token string, or invalid UTF-8.
    pub fn decode_strict(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        let mut bytes = Vec::with_capacity(tokens.len() * 4);

        for &token in tokens {
            if let Some(symbol) = self.vocab.symbol_of(token) {
                byte_level_decode_into(symbol, &mut bytes).map_err(TokenizerError::UnmappedChar)?;
            } else if let Some(special) = self.special_tokens_decoder.get(&token) {
                bytes.extend_from_slice(special.as_bytes());
            } else {
                return Err(TokenizerError::UnknownTokenId(token));
            }
        }

        String::from_utf8(bytes).map_err(|_| TokenizerError::Utf8Error)
    }

    /// Batch encode multiple texts in parallel.
    pub fn encode_batch(&self, texts: &[String]) -> Vec<Vec<u32>> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Batch encode multiple texts with special token handling.
    pub fn encode_batch_with_special(&self, texts: &[String]) -> Vec<Vec<u32>> {
        texts
            .par_iter()
            .map(|text| self.encode_with_special(text))
            .collect()
    }

    /// Batch decode multiple token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<u32>]) -> Vec<String> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    /// Total number of token ID slots: max id over vocabulary and special
    /// tokens, plus one. Zero for an empty tokenizer.
    pub fn vocab_size(&self) -> usize {
        let max_vocab_id = self.vocab.max_token_id();
        let max_special_id = self.special_tokens.values().max().copied();
        match max_vocab_id.max(max_special_id) {
            Some(max_id) => max_id as usize + 1,
            None => 0,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Get the special tokens map.
    pub fn special_tokens(&self) -> &FxHashMap<String, u32> {
        &self.special_tokens
    }

    pub fn pretokenizer(&self) -> &Pretokenizer {
        &self.pretokenizer
    }

    pub fn engine(&self) -> &BpeEngine {
        &self.engine
    }

    /// Clear the chunk cache.
    pub fn clear_cache(&self) {
        self.engine.cache().clear();
    }

    /// Get the current number of cached chunks.
    pub fn cache_len(&self) -> usize {
        self.engine.cache().len()
    }
}
