// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Vocabulary loading from the file formats found in model directories

use image_caption_node::Vocabulary;
use std::io::Write;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_keras_tokenizer_export() {
    let word_index = serde_json::json!({"startseq": 1, "endseq": 2, "a": 3, "dog": 4, "in": 5});
    let export = serde_json::json!({
        "class_name": "Tokenizer",
        "config": {
            "num_words": null,
            "filters": "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n",
            "lower": true,
            "split": " ",
            "char_level": false,
            "oov_token": null,
            "document_count": 8091,
            "word_index": word_index.to_string(),
        }
    });
    let file = write_temp(&export.to_string());

    let vocab = Vocabulary::from_file(file.path()).unwrap();
    assert_eq!(vocab.len(), 5);
    assert_eq!(vocab.word_for_id(4), Some("dog"));
    assert_eq!(vocab.texts_to_sequence("startseq A Dog, in!"), vec![1, 3, 4, 5]);
}

#[test]
fn test_plain_word_index() {
    let file = write_temp(r#"{"startseq": 1, "endseq": 2, "cat": 3}"#);

    let vocab = Vocabulary::from_file(file.path()).unwrap();
    assert_eq!(vocab.id_for_word("cat"), Some(3));
    assert_eq!(vocab.id_space(), 4);
    assert_eq!(vocab.texts_to_sequence("startseq cat"), vec![1, 3]);
}

#[test]
fn test_unknown_words_dropped() {
    let file = write_temp(r#"{"startseq": 1, "cat": 3}"#);
    let vocab = Vocabulary::from_file(file.path()).unwrap();
    assert_eq!(vocab.texts_to_sequence("startseq zebra cat"), vec![1, 3]);
}

#[test]
fn test_missing_file() {
    let err = Vocabulary::from_file("/nonexistent/tokenizer.json").unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_malformed_file() {
    let file = write_temp("[1, 2, 3]");
    assert!(Vocabulary::from_file(file.path()).is_err());
}

#[test]
fn test_huggingface_word_level_tokenizer() {
    let tokenizer = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"<unk>": 0, "startseq": 1, "endseq": 2, "a": 3, "dog": 4},
            "unk_token": "<unk>"
        }
    });
    let file = write_temp(&tokenizer.to_string());

    let vocab = Vocabulary::from_file(file.path()).unwrap();
    assert_eq!(vocab.len(), 5);
    assert_eq!(vocab.word_for_id(4), Some("dog"));
    assert_eq!(vocab.texts_to_sequence("startseq a dog"), vec![1, 3, 4]);
}

#[test]
fn test_plain_word_index_containing_model() {
    let file = write_temp(r#"{"startseq": 1, "endseq": 2, "a": 3, "model": 4, "poses": 5}"#);

    let vocab = Vocabulary::from_file(file.path()).unwrap();
    assert_eq!(vocab.len(), 5);
    assert_eq!(vocab.word_for_id(4), Some("model"));
    assert_eq!(vocab.texts_to_sequence("startseq a model poses"), vec![1, 3, 4, 5]);
}

#[test]
fn test_plain_word_index_containing_config_and_class_name() {
    let file = write_temp(r#"{"startseq": 1, "endseq": 2, "config": 3, "class_name": 4}"#);

    let vocab = Vocabulary::from_file(file.path()).unwrap();
    assert_eq!(vocab.id_for_word("config"), Some(3));
    assert_eq!(vocab.id_for_word("class_name"), Some(4));
}

#[test]
fn test_keras_zero_num_words_keeps_all_ids() {
    let export = serde_json::json!({
        "class_name": "Tokenizer",
        "config": {
            "num_words": 0,
            "word_index": "{\"startseq\": 1, \"dog\": 2}",
        }
    });
    let file = write_temp(&export.to_string());

    let vocab = Vocabulary::from_file(file.path()).unwrap();
    assert_eq!(vocab.texts_to_sequence("startseq dog"), vec![1, 2]);
}

#[test]
fn test_keras_char_level_rejected() {
    let export = serde_json::json!({
        "class_name": "Tokenizer",
        "config": {
            "char_level": true,
            "word_index": "{\"a\": 1, \"b\": 2}",
        }
    });
    let file = write_temp(&export.to_string());

    assert!(Vocabulary::from_file(file.path()).is_err());
}
