//! Rank-driven byte-pair merging of a single chunk.
//!
//! Each step finds the adjacent pair with the lowest rank and merges *every*
//! non-overlapping occurrence of that pair in one left-to-right pass. Pairs
//! without a rank are never candidates. Merging stops when no ranked pair is
//! left or the word has collapsed into one symbol.
//!
//! The word is rescanned after each step, so worst-case cost is quadratic in
//! the chunk length. Chunks come from the pretokenizer and are short in
//! practice; callers feeding adversarial input should bound its length.

use std::sync::Arc;

use super::cache::{LruMergeCache, MergeCache};
use super::vocab::Vocabulary;

/// Separator between symbols in a merged chunk. Never part of a ByteLevel symbol.
pub const SYMBOL_SEPARATOR: char = ' ';

/// Run BPE over an already-split word until no ranked pair remains.
///
/// Re-running it on its own output returns the output unchanged.
pub fn merge_word(mut word: Vec<String>, vocab: &Vocabulary) -> Vec<String> {
    while word.len() > 1 {
        // min_by_key keeps the first of equal minima, i.e. the leftmost pair.
        let best = word
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| vocab.rank(&pair[0], &pair[1]).map(|rank| (i, rank)))
            .min_by_key(|&(_, rank)| rank);

        let Some((i, _)) = best else {
            break;
        };

        let left = word[i].clone();
        let right = word[i + 1].clone();
        let mut merged = Vec::with_capacity(word.len() - 1);
        let mut symbols = word.into_iter().peekable();

        while let Some(symbol) = symbols.next() {
            if symbol == left && symbols.peek() == Some(&right) {
                symbols.next();
                merged.push(format!("{left}{right}"));
            } else {
                merged.push(symbol);
            }
        }

        word = merged;
    }

    word
}

/// Merge a ByteLevel-encoded chunk into its final symbols, without caching.
pub fn byte_pair_merge(chunk: &str, vocab: &Vocabulary) -> Vec<String> {
    let word: Vec<String> = chunk.chars().map(String::from).collect();
    merge_word(word, vocab)
}

/// BPE over one vocabulary, memoizing merged chunks in its own cache.
pub struct BpeEngine {
    vocab: Arc<Vocabulary>,
    cache: Box<dyn MergeCache>,
}

impl BpeEngine {
    /// Engine with a bounded LRU cache of default capacity.
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self::with_cache(vocab, Box::new(LruMergeCache::default()))
    }

    pub fn with_cache(vocab: Arc<Vocabulary>, cache: Box<dyn MergeCache>) -> Self {
        Self { vocab, cache }
    }

    /// Merge a ByteLevel-encoded chunk and return its symbols joined by
    /// [`SYMBOL_SEPARATOR`].
    ///
    /// A chunk with fewer than two characters is returned as is.
    pub fn merge(&self, chunk: &str) -> String {
        if chunk.chars().nth(1).is_none() {
            return chunk.to_string();
        }

        if let Some(cached) = self.cache.get(chunk) {
            return cached;
        }

        let symbols = byte_pair_merge(chunk, &self.vocab);
        let mut joined = String::with_capacity(chunk.len() + symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                joined.push(SYMBOL_SEPARATOR);
            }
            joined.push_str(symbol);
        }

        self.cache.insert(chunk, &joined);
        joined
    }

    /// Merge a ByteLevel-encoded chunk into its final symbols.
    pub fn merge_symbols(&self, chunk: &str) -> Vec<String> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.merge(chunk)
            .split(SYMBOL_SEPARATOR)
            .map(str::to_string)
            .collect()
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn cache(&self) -> &dyn MergeCache {
        self.cache.as_ref()
    }
}

impl Clone for BpeEngine {
    /// Shares the vocabulary; the clone starts with an empty cache.
    fn clone(&self) -> Self {
        Self {
            vocab: Arc::clone(&self.vocab),
            cache: self.cache.fork(),
        }
    }
}

impl std::fmt::Debug for BpeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BpeEngine")
            .field("vocab_len", &self.vocab.len())
            .field("cache_len", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::NoMergeCache;
    use rustc_hash::FxHashMap;

    fn vocab(merges: &[(&str, &str)]) -> Arc<Vocabulary> {
        let merges = merges
            .iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect::<Vec<_>>();
        Arc::new(Vocabulary::from_parts(FxHashMap::default(), merges))
    }

    fn symbols(word: &[&str]) -> Vec<String> {
        word.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_and_single_char() {
        let engine = BpeEngine::new(vocab(&[("a", "b")]));
        assert_eq!(engine.merge(""), "");
        assert_eq!(engine.merge("a"), "a");
        assert_eq!(engine.merge("\u{120}"), "\u{120}");
        assert!(engine.merge_symbols("").is_empty());
        assert_eq!(engine.cache().len(), 0);
    }

    #[test]
    fn test_lowest_rank_merges_first() {
        // "bc" outranks "ab", so "abc" becomes "a bc", not "ab c".
        let engine = BpeEngine::new(vocab(&[("b", "c"), ("a", "b")]));
        assert_eq!(engine.merge("abc"), "a bc");

        let engine = BpeEngine::new(vocab(&[("a", "b"), ("b", "c")]));
        assert_eq!(engine.merge("abc"), "ab c");
    }

    #[test]
    fn test_all_occurrences_merge_in_one_step() {
        // After "a a" merges everywhere, "aa aa" is the only candidate.
        let engine = BpeEngine::new(vocab(&[("a", "a"), ("aa", "aa"), ("a", "aa")]));
        assert_eq!(engine.merge("aaaa"), "aaaa");
        assert_eq!(engine.merge("aaaaa"), "aaaa a");
    }

    #[test]
    fn test_overlapping_occurrences_pair_left_to_right() {
        let engine = BpeEngine::new(vocab(&[("a", "a")]));
        assert_eq!(engine.merge("aaa"), "aa a");
    }

    #[test]
    fn test_unranked_pairs_never_merge() {
        let engine = BpeEngine::new(vocab(&[("x", "y")]));
        assert_eq!(engine.merge("abc"), "a b c");
        let engine = BpeEngine::new(vocab(&[]));
        assert_eq!(engine.merge("ab"), "a b");
    }

    #[test]
    fn test_merge_chain_collapses_word() {
        let engine = BpeEngine::new(vocab(&[
            ("i", "n"),
            ("d", "i"),
            ("in", "di"),
            ("v", "i"),
            ("indi", "vi"),
        ]));
        assert_eq!(engine.merge("indivi"), "indivi");
        assert_eq!(engine.merge("indivisible"), "indivi s i b l e");
    }

    #[test]
    fn test_merge_word_is_idempotent() {
        let vocab = vocab(&[("h", "e"), ("l", "l"), ("he", "ll"), ("o", "!")]);
        let once = merge_word(symbols(&["h", "e", "l", "l", "o", "!"]), &vocab);
        assert_eq!(once, symbols(&["hell", "o!"]));
        assert_eq!(merge_word(once.clone(), &vocab), once);
    }

    #[test]
    fn test_multibyte_symbols() {
        // "👋" as ByteLevel characters.
        let engine = BpeEngine::new(vocab(&[("\u{141}", "\u{133}"), ("\u{f0}", "\u{141}\u{133}")]));
        assert_eq!(engine.merge("\u{f0}\u{141}\u{133}\u{12d}"), "\u{f0}\u{141}\u{133} \u{12d}");
    }

    #[test]
    fn test_cache_populates_and_matches_uncached() {
        let v = vocab(&[("b", "c"), ("a", "bc"), ("d", "d")]);
        let cached = BpeEngine::new(Arc::clone(&v));
        let uncached = BpeEngine::with_cache(Arc::clone(&v), Box::new(NoMergeCache));

        for chunk in ["abc", "abcd", "ddd", "abc"] {
            assert_eq!(cached.merge(chunk), uncached.merge(chunk));
        }
        assert_eq!(cached.cache().len(), 3);
        assert_eq!(uncached.cache().len(), 0);
        assert_eq!(cached.merge_symbols("abcd"), symbols(&["abc", "d"]));
    }

    #[test]
    fn test_clone_starts_with_empty_cache() {
        let engine = BpeEngine::new(vocab(&[("a", "b")]));
        engine.merge("ab");
        let clone = engine.clone();
        assert_eq!(engine.cache().len(), 1);
        assert!(clone.cache().is_empty());
        assert!(Arc::ptr_eq(engine.vocabulary(), clone.vocabulary()));
    }
}
