// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers. The application layer talks to
// these traits, never to the concrete loaders or models, so
// tests can plug in small in-memory versions.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::example::Example;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce the labelled sentence corpus.
///
/// Implementations:
///   - Sst2Loader → GLUE/SST-2 from the Hugging Face hub
pub trait ExampleSource {
    /// Load every example from this source, in source order.
    fn load_all(&self) -> Result<Vec<Example>>;
}

// ─── SentenceEmbedder ─────────────────────────────────────────────────────────
/// Any component that maps sentences to fixed-size vectors.
///
/// Implementations:
///   - EncoderMeanPooler → mean-pooled T5 encoder states
pub trait SentenceEmbedder {
    /// Embed each text. Output order matches input order and
    /// every vector has the same length.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
