// ============================================================
// Layer 6 — Model Hub
// ============================================================
// Fetches the three files a pretrained T5 needs from the
// Hugging Face hub:
//
//   config.json         architecture hyperparameters
//   tokenizer.json      SentencePiece vocabulary (tokenizers format)
//   model.safetensors   pretrained weights
//
// Files land in the standard hub cache (~/.cache/huggingface,
// or $HF_HOME) and later runs reuse them without network
// access.
//
// Reference: Rust Book §9 (Error Handling with anyhow)

use anyhow::{Context, Result};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use std::path::PathBuf;

pub const CONFIG_FILE:    &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE:   &str = "model.safetensors";

/// Local paths of a fetched model
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config:    PathBuf,
    pub tokenizer: PathBuf,
    pub weights:   PathBuf,
}

pub struct ModelHub {
    model_id: String,
}

impl ModelHub {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into() }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Download (or find in cache) config, tokenizer and weights
    pub fn fetch(&self) -> Result<ModelFiles> {
        let api = ApiBuilder::new()
            .with_progress(true)
            .build()
            .context("Cannot initialise the Hugging Face hub client")?;
        let repo = api.model(self.model_id.clone());

        tracing::info!("Fetching '{}' from the Hugging Face hub", self.model_id);
        Ok(ModelFiles {
            config:    self.get(&repo, CONFIG_FILE)?,
            tokenizer: self.get(&repo, TOKENIZER_FILE)?,
            weights:   self.get(&repo, WEIGHTS_FILE)?,
        })
    }

    fn get(&self, repo: &ApiRepo, file: &str) -> Result<PathBuf> {
        let path = repo.get(file).with_context(|| {
            format!("Cannot download '{}' from model repo '{}'", file, self.model_id)
        })?;
        tracing::debug!("{} → {}", file, path.display());
        Ok(path)
    }
}
