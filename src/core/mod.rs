//! Core tokenization engine for bytepair.
//!
//! The pipeline for `encode` is:
//!
//! 1. [`pretokenize`]: split text into chunks with the GPT-2 grammar
//! 2. [`byte_level`]: map each chunk's UTF-8 bytes to printable characters
//! 3. [`bpe`]: merge characters by rank until no ranked pair remains
//! 4. [`vocab`]: look each merged symbol up in the encoder table
//!
//! `decode` inverts steps 4 and 2. Merged chunks are memoized per engine by a
//! pluggable [`cache`] policy, and [`StreamingDecoder`] decodes token-by-token
//! output without splitting characters.

pub mod bpe;
pub mod byte_level;
pub mod cache;
pub mod pretokenize;
pub mod pretrained;
mod streaming;
mod tokenizer;
pub mod vocab;

pub use bpe::{byte_pair_merge, merge_word, BpeEngine};
pub use byte_level::{byte_level_decode, byte_level_decode_lossy, byte_level_encode};
pub use cache::{
    CacheConfig, LruMergeCache, MergeCache, NoMergeCache, UnboundedMergeCache, DEFAULT_CACHE_SIZE,
};
pub use pretokenize::{Pretokenizer, GPT2_PATTERN};
pub use pretrained::{from_pretrained, PretrainedVocab, GPT2_END_OF_TEXT};
pub use streaming::{StreamingDecoder, Utf8Buffer};
pub use tokenizer::{Encoding, Tokenizer, TokenizerConfig, TokenizerError};
pub use vocab::{build_decoder, parse_encoder, parse_merges, VocabError, Vocabulary};
