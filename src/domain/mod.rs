// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits describing what the pipeline
// works with. No Burn types, no file or network access here.
//
//   example.rs   — a labelled sentence from the sentiment corpus
//   proposal.rs  — the Problem / Hypothesis / Methodology record
//                  and the template that builds it
//   traits.rs    — seams the other layers implement
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A (sentence, sentiment) pair from the corpus
pub mod example;

// The three-section proposal record and its template
pub mod proposal;

// Core abstractions (traits) that other layers implement
pub mod traits;
