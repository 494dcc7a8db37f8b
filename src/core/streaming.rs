//! UTF-8 safe streaming decoder for token-by-token model output.
//!
//! A byte-level token can end in the middle of a multi-byte character (most
//! emoji span two or three GPT-2 tokens). The decoder buffers the incomplete
//! tail and only emits whole characters.

use super::tokenizer::Tokenizer;

/// Accumulates raw bytes and hands out the longest complete UTF-8 prefix.
///
/// Byte sequences that can never become valid (as opposed to ones that are
/// merely incomplete) are replaced with U+FFFD as soon as they are seen, so
/// one bad byte never stalls the stream.
#[derive(Debug, Clone, Default)]
pub struct Utf8Buffer {
    buffer: Vec<u8>,
}

impl Utf8Buffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(16),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Remove and return every complete character in the buffer.
    ///
    /// Returns `None` if nothing can be emitted yet.
    pub fn take_complete(&mut self) -> Option<String> {
        let mut out = String::new();
        let mut consumed = 0;

        loop {
            let rest = &self.buffer[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.buffer.len();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    // The prefix was just validated by from_utf8.
                    out.push_str(std::str::from_utf8(&rest[..valid_up_to]).unwrap_or_default());
                    consumed += valid_up_to;
                    match e.error_len() {
                        Some(invalid_len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += invalid_len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => break,
                    }
                }
            }
        }

        self.buffer.drain(..consumed);
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// Drain the buffer, replacing an incomplete tail with U+FFFD.
    pub fn flush(&mut self) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }

        let result = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        result
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

/// A streaming decoder that handles incomplete UTF-8 sequences across token boundaries.
///
/// # Example
///
/// ```ignore
/// let tokenizer = Tokenizer::from_pretrained("gpt2")?;
/// let mut decoder = StreamingDecoder::new(&tokenizer);
///
/// for token_id in token_stream {
///     if let Some(text) = decoder.add_token(token_id) {
///         print!("{}", text);
///     }
/// }
/// // Flush any remaining buffered bytes
/// print!("{}", decoder.flush());
/// ```
pub struct StreamingDecoder<'a> {
    tokenizer: &'a Tokenizer,
    buffer: Utf8Buffer,
}

impl<'a> StreamingDecoder<'a> {
    pub fn new(tokenizer: &'a Tokenizer) -> Self {
        Self {
            tokenizer,
            buffer: Utf8Buffer::new(),
        }
    }

    /// Add a token and return any complete UTF-8 characters.
    ///
    /// Unknown ids contribute nothing. Returns `None` while the buffered bytes
    /// are still incomplete.
    pub fn add_token(&mut self, token_id: u32) -> Option<String> {
        let bytes = self.tokenizer.token_bytes(token_id)?;
        self.buffer.push(&bytes);
        self.buffer.take_complete()
    }

    /// Add multiple tokens at once and return complete UTF-8 characters.
    pub fn add_tokens(&mut self, token_ids: &[u32]) -> Option<String> {
        for &token_id in token_ids {
            if let Some(bytes) = self.tokenizer.token_bytes(token_id) {
                self.buffer.push(&bytes);
            }
        }
        self.buffer.take_complete()
    }

    /// Flush any remaining buffered bytes.
    ///
    /// An incomplete UTF-8 sequence left in the buffer becomes U+FFFD.
    pub fn flush(&mut self) -> String {
        self.buffer.flush()
    }

    /// Reset the decoder state, discarding any buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.reset();
    }

    /// Check if there are buffered bytes waiting for completion.
    pub fn has_pending(&self) -> bool {
        self.buffer.has_pending()
    }

    /// Get the number of pending bytes in the buffer.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.pending_bytes()
    }
}
