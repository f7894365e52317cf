// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Scores the generated proposals once training is over.
//
//   rouge.rs      — ROUGE-1 / ROUGE-2 / ROUGE-L against the
//                   template references
//   novelty.rs    — 1 − mean cosine similarity between the
//                   embeddings of the predictions themselves
//   relevance.rs  — fraction of predictions carrying all three
//                   section markers
//
// None of these touch tensors. Embeddings come in through the
// SentenceEmbedder trait so tests can feed fixed vectors.
//
// Reference: Lin (2004) ROUGE
//            Rust Book §10 (Traits as Parameters)

pub mod novelty;
pub mod relevance;
pub mod rouge;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::traits::SentenceEmbedder;

/// Final scores of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rouge1:          f64,
    pub rouge2:          f64,
    pub rouge_l:         f64,
    pub novelty:         f64,
    pub relevance:       f64,
    pub num_predictions: usize,
    /// Predictions actually embedded for the novelty score
    pub novelty_sample:  usize,
}

impl EvaluationReport {
    pub fn print(&self) {
        println!("ROUGE-1:   {:.4}", self.rouge1);
        println!("ROUGE-2:   {:.4}", self.rouge2);
        println!("ROUGE-L:   {:.4}", self.rouge_l);
        println!("Novelty:   {:.4}  (first {} predictions)", self.novelty, self.novelty_sample);
        println!("Relevance: {:.4}  ({} predictions)", self.relevance, self.num_predictions);
    }
}

/// Score aligned predictions against references.
/// Novelty uses only the first `novelty_sample` predictions.
pub fn evaluate(
    predictions:    &[String],
    references:     &[String],
    embedder:       &dyn SentenceEmbedder,
    novelty_sample: usize,
) -> Result<EvaluationReport> {
    ensure!(
        predictions.len() == references.len(),
        "Predictions and references are misaligned ({} vs {})",
        predictions.len(),
        references.len(),
    );

    let rouge = rouge::corpus_rouge(predictions, references);

    let sample     = &predictions[..novelty_sample.min(predictions.len())];
    let embeddings = embedder.embed(sample)?;
    ensure!(
        embeddings.len() == sample.len(),
        "Embedder returned {} vectors for {} texts",
        embeddings.len(),
        sample.len(),
    );
    tracing::debug!("Embedded {} predictions for novelty", sample.len());

    Ok(EvaluationReport {
        rouge1:          rouge.rouge1,
        rouge2:          rouge.rouge2,
        rouge_l:         rouge.rouge_l,
        novelty:         novelty::novelty(&embeddings),
        relevance:       relevance::relevance(predictions),
        num_predictions: predictions.len(),
        novelty_sample:  sample.len(),
    })
}
