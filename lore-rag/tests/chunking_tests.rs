//! Property tests for token-window chunking.

use lore_rag::chunking::chunk;
use lore_rag::tokenizer::{Tokenizer, WordTokenizer};
use proptest::prelude::*;

fn tokens_of(text: &str) -> Vec<String> {
    WordTokenizer.tokenize(text).iter().map(|t| t.as_str(text).to_string()).collect()
}

/// Generate a chunk size and an overlap strictly below it.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

/// Generate a document of lowercase words separated by mixed whitespace.
fn arb_document() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{1,8}", 0..200)
}

fn join_words(words: &[String]) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| if i % 7 == 6 { format!("{w}\n") } else { format!("{w} ") })
        .collect()
}

/// *For any* document and valid `(chunk_size, chunk_overlap)`, chunks are
/// bounded by `chunk_size`, consecutive chunks overlap by exactly
/// `chunk_overlap` tokens, and stitching them together with the overlap
/// removed reproduces the document's token stream.
mod prop_chunk_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_cover_the_token_stream_exactly(
            words in arb_document(),
            (size, overlap) in arb_params(),
        ) {
            let document = join_words(&words);
            let chunks = chunk(&document, size, overlap).unwrap();

            if words.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            prop_assert_eq!(chunks[0].start_offset, 0);
            prop_assert_eq!(chunks.last().unwrap().end_offset, words.len());

            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.index, i);
                prop_assert!(c.token_len() >= 1);
                prop_assert!(c.token_len() <= size);
                prop_assert!(document.contains(&c.text));
            }

            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[1].start_offset, pair[0].end_offset - overlap);
            }

            let mut rebuilt: Vec<String> = Vec::new();
            let mut covered = 0;
            for c in &chunks {
                let tokens = tokens_of(&c.text);
                prop_assert_eq!(tokens.len(), c.token_len());
                rebuilt.extend(tokens.into_iter().skip(covered - c.start_offset));
                covered = c.end_offset;
            }
            prop_assert_eq!(rebuilt, words);
        }

        #[test]
        fn documents_shorter_than_chunk_size_are_one_chunk(
            words in proptest::collection::vec("[a-z]{1,8}", 1..50),
        ) {
            let document = join_words(&words);
            let chunks = chunk(&document, 3000, 20).unwrap();
            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(chunks[0].end_offset, words.len());
            prop_assert_eq!(chunks[0].text.as_str(), document.trim_end());
        }
    }
}

#[test]
fn fifty_tokens_with_default_size_is_one_chunk() {
    let document: String = (0..50).map(|i| format!("word{i} ")).collect();
    let chunks = chunk(&document, 3000, 20).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 50));
}

#[test]
fn twenty_five_tokens_size_ten_overlap_three() {
    let document: String = (0..25).map(|i| format!("t{i} ")).collect();
    let chunks = chunk(&document, 10, 3).unwrap();
    let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
    assert_eq!(starts, vec![0, 7, 14, 21]);
    assert!(chunks.last().unwrap().token_len() < 10);
    assert_eq!(chunks[1].text, "t7 t8 t9 t10 t11 t12 t13 t14 t15 t16");
}
