pub mod core;
#[cfg(feature = "python")]
mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub use crate::core::pretrained;
pub use crate::core::{
    CacheConfig, Encoding, PretrainedVocab, StreamingDecoder, Tokenizer, TokenizerConfig,
    TokenizerError, VocabError, Vocabulary, GPT2_PATTERN,
};

/// bytepair - GPT-2 byte-level BPE tokenizer with Python bindings
///
/// - fancy-regex pretokenizer with the GPT-2 grammar
/// - Rank-driven BPE over the 256-character ByteLevel alphabet
/// - Per-tokenizer LRU cache of merged chunks
/// - Aho-Corasick matching for special tokens
/// - Rayon parallelism for batch encoding
/// - UTF-8 streaming decoder for LLM output
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyTokenizer>()?;
    m.add_class::<python::PyStreamingDecoder>()?;
    m.add("GPT2_PATTERN", GPT2_PATTERN)?;
    m.add("GPT2_END_OF_TEXT", crate::core::GPT2_END_OF_TEXT)?;
    Ok(())
}
