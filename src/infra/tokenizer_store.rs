// ============================================================
// Layer 6 - Tokenizer Store
// ============================================================
// Loads a HuggingFace `tokenizer.json` (e.g. the GPT-2 one) and
// works out which id acts as the document delimiter.
//
// Padding and truncation configured inside the JSON are turned
// off after loading: the packer decides lengths, not the
// tokenizer.
//
// The delimiter is given either as a token string, looked up in
// the vocabulary (default "<|endoftext|>"), or as a raw id that
// must exist in the vocabulary.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

/// GPT-2's end-of-text token, the delimiter used by default
pub const DEFAULT_DELIMITER_TOKEN: &str = "<|endoftext|>";

/// How the delimiter id is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Id(u32),
    Token(String),
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::Token(DEFAULT_DELIMITER_TOKEN.to_string())
    }
}

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tokenizer with padding and truncation disabled.
    pub fn load(&self) -> Result<Tokenizer> {
        let mut tokenizer = Tokenizer::from_file(&self.path).map_err(|e| {
            anyhow!("Cannot load tokenizer from '{}': {}", self.path.display(), e)
        })?;
        tokenizer
            .with_truncation(None)
            .map_err(|e| anyhow!("Cannot disable truncation: {e}"))?;
        tokenizer.with_padding(None);

        tracing::info!(
            "Loaded tokenizer from '{}' ({} tokens)",
            self.path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(tokenizer)
    }
}

/// Turn a delimiter choice into a concrete id.
pub fn resolve_delimiter(tokenizer: &Tokenizer, delimiter: &Delimiter) -> Result<u32> {
    match delimiter {
        Delimiter::Token(token) => tokenizer
            .token_to_id(token)
            .ok_or_else(|| anyhow!("Delimiter token '{token}' is not in the vocabulary")),
        Delimiter::Id(id) => {
            if tokenizer.id_to_token(*id).is_none() {
                bail!("Delimiter id {id} is not in the vocabulary");
            }
            Ok(*id)
        }
    }
}

// ─── Test Fixture ─────────────────────────────────────────────────────────────
// A tiny word-level tokenizer written as HuggingFace JSON, shared
// by the tests of every module that needs real token ids.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const WORDS: &[&str] = &["cells", "divide", "tissue", "grow", "fast", "."];

    pub fn word_level_json() -> serde_json::Value {
        let mut vocab = serde_json::json!({
            "[UNK]":         0,
            "<|endoftext|>": 1,
        });
        for (i, word) in WORDS.iter().enumerate() {
            vocab[*word] = serde_json::json!(i + 2);
        }

        serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0, "content": "[UNK]",         "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 1, "content": "<|endoftext|>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        })
    }

    /// Write the fixture into `dir` and return its path.
    pub fn write_word_level(dir: &Path) -> PathBuf {
        let path = dir.join("tokenizer.json");
        std::fs::write(&path, serde_json::to_string_pretty(&word_level_json()).unwrap()).unwrap();
        path
    }

    pub fn word_level_tokenizer() -> Tokenizer {
        let dir = tempfile::tempdir().unwrap();
        TokenizerStore::new(write_word_level(dir.path())).load().unwrap()
    }
}
