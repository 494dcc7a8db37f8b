//! Splitting raw text into chunks before BPE.
//!
//! BPE never merges across chunk boundaries, so the split decides which token
//! ids are even reachable. The GPT-2 grammar below must stay bit-for-bit
//! identical to the one the vocabulary was trained with.

use fancy_regex::Regex;

/// GPT-2 pretokenization grammar. Alternatives are tried in order, first match wins:
/// contractions, letter runs, digit runs and punctuation runs (each with an
/// optional leading space), trailing whitespace not followed by a
/// non-space, then any whitespace run.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Regex-driven splitter whose output always partitions its input.
#[derive(Debug, Clone)]
pub struct Pretokenizer {
    regex: Regex,
}

impl Pretokenizer {
    /// Pretokenizer using [`GPT2_PATTERN`].
    pub fn new() -> Result<Self, fancy_regex::Error> {
        Self::with_pattern(GPT2_PATTERN)
    }

    pub fn with_pattern(pattern: &str) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Byte ranges of the chunks of `text`, in order.
    ///
    /// The ranges are contiguous and cover all of `text`: text skipped by the
    /// pattern becomes its own chunk. fancy-regex gives up on very long
    /// whitespace runs (backtrack limit), so such a run is split by hand with
    /// the same rule as `\s+(?!\S)` and scanning resumes after it.
    pub fn split_offsets(&self, text: &str) -> Vec<(usize, usize)> {
        let mut offsets = Vec::new();
        let mut last_end = 0;
        let mut pos = 0;

        while pos < text.len() {
            let (start, end) = match self.regex.find_from_pos(text, pos) {
                Ok(Some(m)) => (m.start(), m.end()),
                Ok(None) => break,
                Err(e) => match whitespace_run_end(text, pos) {
                    Some(end) => {
                        tracing::debug!(
                            error = %e,
                            offset = pos,
                            len = end - pos,
                            "pretokenizer regex gave up, splitting whitespace run by hand"
                        );
                        (pos, end)
                    }
                    None => {
                        tracing::warn!(
                            error = %e,
                            offset = pos,
                            "pretokenizer regex failed, keeping remainder as one chunk"
                        );
                        break;
                    }
                },
            };

            if start == end {
                // Step past the empty match so the scan always advances.
                pos = text[end..]
                    .chars()
                    .next()
                    .map_or(text.len(), |c| end + c.len_utf8());
                continue;
            }
            if start > last_end {
                offsets.push((last_end, start));
            }
            offsets.push((start, end));
            last_end = end;
            pos = end;
        }

        if last_end < text.len() {
            offsets.push((last_end, text.len()));
        }

        offsets
    }

    /// Split `text` into chunks that concatenate back to `text`.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.split_offsets(text)
            .into_iter()
            .map(|(start, end)| &text[start..end])
            .collect()
    }
}

/// End of the GPT-2 whitespace chunk starting at `pos`, or `None` if `text`
/// has no whitespace there.
///
/// A run that reaches the end of `text` is taken whole. Otherwise its last
/// character is left for the following chunk (` word`, ` 's`, ...), unless
/// the run is a single character.
fn whitespace_run_end(text: &str, pos: usize) -> Option<usize> {
    let mut chars = text[pos..].char_indices().take_while(|(_, c)| c.is_whitespace());
    let (_, first) = chars.next()?;
    let mut last_start = pos;
    let mut end = pos + first.len_utf8();
    for (i, c) in chars {
        last_start = pos + i;
        end = pos + i + c.len_utf8();
    }

    if end == text.len() || last_start == pos {
        Some(end)
    } else {
        Some(last_start)
    }
}
