// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the pretrained model's tokenizer from its HuggingFace
// `tokenizer.json` file.
//
// The vocabulary is fixed: it must be the one the pretrained
// weights were trained with, so we never build or retrain a
// vocabulary here. The file is fetched by `infra::hub` and
// cached locally; this module only turns it into a Tokenizer.
//
// Tests build a tiny word-level tokenizer in memory from the
// same HuggingFace JSON format, so no network is needed.
//
// Reference: tokenizers crate documentation

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the tokenizer JSON file
    pub fn load(&self) -> Result<Tokenizer> {
        load_tokenizer(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Cannot load tokenizer from '{}'", path.display()))
}

/// Build a whitespace word-level tokenizer over `words`.
///
/// Special tokens mirror T5: <pad> = 0, </s> = 1, <unk> = 2.
/// Words get ids from 3 upwards in the order given.
#[cfg(test)]
pub fn word_level_tokenizer(words: &[&str]) -> Tokenizer {
    let mut vocab = serde_json::json!({
        "<pad>": 0,
        "</s>":  1,
        "<unk>": 2,
    });

    let mut next_id = 3usize;
    for word in words {
        if vocab.get(*word).is_none() {
            vocab[*word] = serde_json::json!(next_id);
            next_id += 1;
        }
    }

    let special = |id: usize, content: &str| {
        serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };

    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [special(0, "<pad>"), special(1, "</s>"), special(2, "<unk>")],
        "normalizer": null,
        "pre_tokenizer": { "type": "WhitespaceSplit" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "<unk>"
        }
    });

    let bytes = serde_json::to_vec(&tokenizer_json).unwrap();
    Tokenizer::from_bytes(bytes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_level_ids() {
        let tok = word_level_tokenizer(&["hello", "world"]);
        let enc = tok.encode("hello world", false).unwrap();
        assert_eq!(enc.get_ids(), &[3, 4]);
        assert_eq!(tok.token_to_id("</s>"), Some(1));
    }

    #[test]
    fn test_unknown_word_maps_to_unk() {
        let tok = word_level_tokenizer(&["hello"]);
        let enc = tok.encode("goodbye", false).unwrap();
        assert_eq!(enc.get_ids(), &[2]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let store = TokenizerStore::new("/definitely/not/here/tokenizer.json");
        let err   = store.load().unwrap_err();
        assert!(format!("{err:#}").contains("Cannot load tokenizer"));
    }
}
