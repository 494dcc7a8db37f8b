//! Python bindings for the bytepair tokenizer.
//!
//! PyO3 wrappers around the core Rust tokenizer.
//!
//! # Thread Safety
//!
//! The tokenizer is thread-safe and can be shared across Python threads.
//! Batch operations use Rayon to parallelize across inputs.
//!
//! # Example
//!
//! ```python
//! from bytepair import Tokenizer
//!
//! tokenizer = Tokenizer.from_pretrained("gpt2")
//!
//! tokens = tokenizer.encode("Hello, world!")
//! text = tokenizer.decode(tokens)
//!
//! # Streaming decode for LLM output
//! decoder = tokenizer.streaming_decoder()
//! for token_id in token_stream:
//!     if text := decoder.add_token(token_id):
//!         print(text, end="", flush=True)
//! ```

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::core::{
    CacheConfig, Tokenizer, TokenizerConfig, TokenizerError, Utf8Buffer, VocabError, Vocabulary,
};

fn to_py_err(err: TokenizerError) -> PyErr {
    match err {
        TokenizerError::VocabError(e @ VocabError::IoError { .. }) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python wrapper for the Rust Tokenizer.
#[pyclass(name = "Tokenizer")]
pub struct PyTokenizer {
    inner: Arc<Tokenizer>,
}

#[pymethods]
impl PyTokenizer {
    /// Create a tokenizer from an encoder file and a merges file.
    ///
    /// Args:
    ///     encoder_path: Path to encoder.json (token string to id)
    ///     merges_path: Path to vocab.bpe (one merge rule per line)
    ///     special_tokens: Optional dict of special tokens to IDs
    ///     cache_size: Chunk cache capacity; 0 disables caching
    #[new]
    #[pyo3(signature = (encoder_path, merges_path, special_tokens=None, cache_size=None))]
    fn new(
        encoder_path: &str,
        merges_path: &str,
        special_tokens: Option<&Bound<'_, PyDict>>,
        cache_size: Option<usize>,
    ) -> PyResult<Self> {
        let vocab = Vocabulary::load_files(encoder_path, merges_path)
            .map_err(|e| to_py_err(e.into()))?;
        let config = build_config(special_tokens, cache_size)?;
        let inner = Tokenizer::with_config(vocab, config).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Create a tokenizer from an encoder file and a merges file.
    ///
    /// Same as the constructor.
    #[staticmethod]
    #[pyo3(signature = (encoder_path, merges_path, special_tokens=None, cache_size=None))]
    fn from_files(
        encoder_path: &str,
        merges_path: &str,
        special_tokens: Option<&Bound<'_, PyDict>>,
        cache_size: Option<usize>,
    ) -> PyResult<Self> {
        Self::new(encoder_path, merges_path, special_tokens, cache_size)
    }

    /// Create a tokenizer from raw encoder (JSON) and merges bytes.
    #[staticmethod]
    #[pyo3(signature = (encoder_data, merges_data, special_tokens=None, cache_size=None))]
    fn from_bytes(
        encoder_data: &[u8],
        merges_data: &[u8],
        special_tokens: Option<&Bound<'_, PyDict>>,
        cache_size: Option<usize>,
    ) -> PyResult<Self> {
        let vocab = Vocabulary::load(encoder_data, merges_data).map_err(|e| to_py_err(e.into()))?;
        let config = build_config(special_tokens, cache_size)?;
        let inner = Tokenizer::with_config(vocab, config).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Create a tokenizer from a pretrained model name.
    ///
    /// Currently supported:
    /// - "gpt2" / "r50k_base"
    ///
    /// Vocabulary files are read from $BYTEPAIR_VOCAB_DIR/<model>/.
    #[staticmethod]
    fn from_pretrained(name: &str) -> PyResult<Self> {
        let inner = Tokenizer::from_pretrained(name).map_err(to_py_err)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Encode text to token IDs.
    ///
    /// Special tokens in the input are treated as regular text.
    fn encode(&self, text: &str) -> Vec<u32> {
        self.inner.encode(text)
    }

    /// Encode text, raising ValueError if any symbol has no token id.
    fn encode_strict(&self, text: &str) -> PyResult<Vec<u32>> {
        self.inner.encode_strict(text).map_err(to_py_err)
    }

    /// Encode text with special token handling.
    ///
    /// Special tokens in the input are encoded directly without BPE.
    fn encode_with_special(&self, text: &str) -> Vec<u32> {
        self.inner.encode_with_special(text)
    }

    /// Decode token IDs to a string.
    ///
    /// Unknown IDs are skipped. Returns "" if the bytes are not valid UTF-8.
    fn decode(&self, tokens: Vec<u32>) -> String {
        self.inner.decode(&tokens)
    }

    /// Decode token IDs to a string.
    ///
    /// Raises:
    ///     ValueError: On an unknown ID or invalid UTF-8
    fn decode_strict(&self, tokens: Vec<u32>) -> PyResult<String> {
        self.inner.decode_strict(&tokens).map_err(to_py_err)
    }

    /// Decode token IDs to bytes.
    fn decode_bytes(&self, tokens: Vec<u32>) -> Vec<u8> {
        self.inner.decode_bytes(&tokens)
    }

    /// Decode token IDs to string, replacing invalid UTF-8.
    fn decode_lossy(&self, tokens: Vec<u32>) -> String {
        self.inner.decode_lossy(&tokens)
    }

    /// Batch encode multiple texts in parallel.
    fn encode_batch(&self, texts: Vec<String>) -> Vec<Vec<u32>> {
        self.inner.encode_batch(&texts)
    }

    /// Batch encode multiple texts with special token handling.
    fn encode_batch_with_special(&self, texts: Vec<String>) -> Vec<Vec<u32>> {
        self.inner.encode_batch_with_special(&texts)
    }

    /// Batch decode multiple token lists in parallel.
    fn decode_batch(&self, token_lists: Vec<Vec<u32>>) -> Vec<String> {
        self.inner.decode_batch(&token_lists)
    }

    /// Get the vocabulary size (including special tokens).
    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    /// Get the special tokens as a dict of string to ID.
    #[getter]
    fn special_tokens(&self) -> FxHashMap<String, u32> {
        self.inner.special_tokens().clone()
    }

    /// Create a streaming decoder for UTF-8 safe token-by-token decoding.
    ///
    /// Example:
    ///     decoder = tokenizer.streaming_decoder()
    ///     for token_id in token_stream:
    ///         if text := decoder.add_token(token_id):
    ///             print(text, end="", flush=True)
    ///     print(decoder.flush())
    fn streaming_decoder(&self) -> PyStreamingDecoder {
        PyStreamingDecoder {
            tokenizer: Arc::clone(&self.inner),
            buffer: Utf8Buffer::new(),
        }
    }

    /// Clear the encoding cache.
    fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    /// Get the number of entries in the cache.
    #[getter]
    fn cache_len(&self) -> usize {
        self.inner.cache_len()
    }

    fn __repr__(&self) -> String {
        format!("Tokenizer(vocab_size={})", self.inner.vocab_size())
    }
}

fn build_config(
    special_tokens: Option<&Bound<'_, PyDict>>,
    cache_size: Option<usize>,
) -> PyResult<TokenizerConfig> {
    let cache = match cache_size {
        Some(0) => CacheConfig::Disabled,
        Some(capacity) => CacheConfig::Lru { capacity },
        None => CacheConfig::default(),
    };
    Ok(TokenizerConfig {
        cache,
        special_tokens: parse_special_tokens(special_tokens)?,
    })
}

/// Parse special tokens from Python dict to FxHashMap.
fn parse_special_tokens(
    special_tokens: Option<&Bound<'_, PyDict>>,
) -> PyResult<FxHashMap<String, u32>> {
    let mut result = FxHashMap::default();

    if let Some(dict) = special_tokens {
        for (key, value) in dict.iter() {
            let k: String = key.extract()?;
            let v: u32 = value.extract()?;
            result.insert(k, v);
        }
    }

    Ok(result)
}

/// Python wrapper for streaming decoder.
///
/// Buffers incomplete UTF-8 sequences and only emits complete characters.
#[pyclass(name = "StreamingDecoder")]
pub struct PyStreamingDecoder {
    tokenizer: Arc<Tokenizer>,
    buffer: Utf8Buffer,
}

#[pymethods]
impl PyStreamingDecoder {
    /// Add a token and return any complete UTF-8 characters.
    ///
    /// Returns:
    ///     String of complete characters, or None if still buffering
    fn add_token(&mut self, token_id: u32) -> Option<String> {
        let bytes = self.tokenizer.token_bytes(token_id)?;
        self.buffer.push(&bytes);
        self.buffer.take_complete()
    }

    /// Add multiple tokens at once and return complete UTF-8 characters.
    fn add_tokens(&mut self, token_ids: Vec<u32>) -> Option<String> {
        for token_id in token_ids {
            if let Some(bytes) = self.tokenizer.token_bytes(token_id) {
                self.buffer.push(&bytes);
            }
        }
        self.buffer.take_complete()
    }

    /// Flush any remaining buffered bytes.
    ///
    /// An incomplete UTF-8 sequence becomes U+FFFD.
    fn flush(&mut self) -> String {
        self.buffer.flush()
    }

    /// Reset the decoder state, discarding any buffered bytes.
    fn reset(&mut self) {
        self.buffer.reset();
    }

    /// Check if there are buffered bytes waiting for completion.
    #[getter]
    fn has_pending(&self) -> bool {
        self.buffer.has_pending()
    }

    /// Get the number of pending bytes in the buffer.
    #[getter]
    fn pending_bytes(&self) -> usize {
        self.buffer.pending_bytes()
    }

    fn __repr__(&self) -> String {
        format!("StreamingDecoder(pending_bytes={})", self.buffer.pending_bytes())
    }
}
