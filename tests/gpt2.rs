//! Integration tests against the real GPT-2 vocabulary.
//!
//! The vocabulary files are not checked in, so these tests are ignored by
//! default. Run `scripts/fetch_gpt2_vocab.sh` (or point `BYTEPAIR_VOCAB_DIR`
//! at a directory containing `gpt2/encoder.json` and `gpt2/vocab.bpe`), then
//! `cargo test --test gpt2 -- --ignored`.

use bytepair::pretrained::{self, PretrainedVocab, GPT2_END_OF_TEXT};
use bytepair::{StreamingDecoder, Tokenizer};
use std::sync::LazyLock;

static TOKENIZER: LazyLock<Tokenizer> = LazyLock::new(create_gpt2_tokenizer_impl);

fn create_gpt2_tokenizer_impl() -> Tokenizer {
    pretrained::from_vocab(PretrainedVocab::Gpt2).unwrap_or_else(|e| {
        panic!(
            "GPT-2 vocabulary not loadable from {}: {e}",
            pretrained::vocab_dir(PretrainedVocab::Gpt2).display()
        )
    })
}

fn gpt2() -> &'static Tokenizer {
    &TOKENIZER
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_single_whitespace() {
    let tokenizer = gpt2();
    assert_eq!(tokenizer.encode(" "), vec![220]);
    assert_eq!(tokenizer.encode("\t"), vec![197]);
    assert_eq!(tokenizer.decode(&[220]), " ");
    assert_eq!(tokenizer.decode(&[197]), "\t");
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_simple_text() {
    let tokenizer = gpt2();
    let text = "This is some text";
    let tokens = tokenizer.encode(text);
    assert_eq!(tokens, vec![1212, 318, 617, 2420]);
    assert_eq!(tokenizer.decode(&tokens), text);
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_hello_world() {
    let tokenizer = gpt2();
    assert_eq!(tokenizer.encode("Hello, world!"), vec![15496, 11, 995, 0]);
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_word_split_into_subwords() {
    let tokenizer = gpt2();
    let tokens = tokenizer.encode("indivisible");
    assert_eq!(tokens, vec![521, 452, 12843]);
    assert_eq!(tokenizer.decode(&tokens), "indivisible");
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_emoji() {
    let tokenizer = gpt2();
    let text = "hello 👋 world 🌍";
    let tokens = tokenizer.encode(text);
    assert_eq!(tokens, vec![31373, 50169, 233, 995, 12520, 234, 235]);
    assert_eq!(tokenizer.decode(&tokens), text);
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_object_property_names() {
    let tokenizer = gpt2();
    let text = "toString constructor hasOwnProperty valueOf";
    let tokens = tokenizer.encode(text);
    assert_eq!(tokens, vec![1462, 10100, 23772, 468, 23858, 21746, 1988, 5189]);
    assert_eq!(tokenizer.decode(&tokens), text);
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_encode_decode_roundtrip() {
    let tokenizer = gpt2();

    let test_cases = vec![
        "Hello, world!",
        "The quick brown fox jumps over the lazy dog.",
        "Rust is a systems programming language.",
        "1234567890",
        "Special characters: !@#$%^&*()",
        "Multi-line\ntext\nwith\nnewlines",
        "Unicode: こんにちは 世界 🦀",
        "   leading spaces and trailing   ",
        "I'm sure they'll say it's fine",
        "\u{0}\u{7}\u{1b}[0m",
    ];

    for text in test_cases {
        let tokens = tokenizer.encode(text);
        assert!(tokenizer.encode_with_report(text).is_lossless());
        assert_eq!(tokenizer.decode(&tokens), text, "Roundtrip failed for: {:?}", text);
    }
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_vocab_size() {
    let tokenizer = gpt2();
    assert_eq!(tokenizer.vocab_size(), 50257);
    assert_eq!(tokenizer.vocabulary().len(), 50257);
    assert_eq!(tokenizer.vocabulary().merges_len(), 50000);
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_end_of_text() {
    let tokenizer = gpt2();

    let tokens = tokenizer.encode_with_special("Hello<|endoftext|>World");
    assert!(tokens.contains(&GPT2_END_OF_TEXT));
    assert_eq!(tokenizer.decode(&tokens), "Hello<|endoftext|>World");

    // Ordinary encoding treats the marker as text.
    assert!(!tokenizer.encode("<|endoftext|>").contains(&GPT2_END_OF_TEXT));
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_streaming_emoji() {
    let tokenizer = gpt2();

    // 👋 spans two tokens: 50169 ends mid-character.
    let mut decoder = StreamingDecoder::new(tokenizer);
    assert_eq!(decoder.add_token(31373), Some("hello".to_string()));
    assert_eq!(decoder.add_token(50169), Some(" ".to_string()));
    assert!(decoder.has_pending());
    assert_eq!(decoder.add_token(233), Some("👋".to_string()));
    assert!(!decoder.has_pending());
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_batch_matches_sequential() {
    let tokenizer = gpt2();
    let texts: Vec<String> = (0..64)
        .map(|i| format!("Document number {i}: the answer is {}", i * 7))
        .collect();

    let batch = tokenizer.encode_batch(&texts);
    for (text, tokens) in texts.iter().zip(&batch) {
        assert_eq!(&tokenizer.encode(text), tokens);
    }
    assert_eq!(tokenizer.decode_batch(&batch), texts);
}

#[test]
#[ignore = "needs the GPT-2 vocabulary (scripts/fetch_gpt2_vocab.sh)"]
fn test_gpt2_strict_decode() {
    let tokenizer = gpt2();
    assert_eq!(tokenizer.decode_strict(&[1212, 318]).unwrap(), "This is");
    assert!(tokenizer.decode_strict(&[1212, 60000]).is_err());
    // First half of 👋 alone is not valid UTF-8.
    assert_eq!(tokenizer.decode(&[50169, 233]), " 👋");
    assert!(tokenizer.decode_strict(&[233]).is_err());
}
