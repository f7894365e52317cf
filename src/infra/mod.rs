// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   hub.rs             — Hugging Face hub access
//                        Downloads config.json, tokenizer.json
//                        and model.safetensors for the chosen
//                        model id into the local hub cache.
//
//   tokenizer_store.rs — Loads the pretrained tokenizer.json
//                        with the `tokenizers` crate.
//
//   metrics.rs         — Per-epoch train/val loss CSV.
//
//   run_store.rs       — Run artefacts as JSON: the settings
//                        the run used and its final scores.
//
//   plot.rs            — Terminal line chart of the losses.
//
// Nothing here knows about tensors; the ML layer gets plain
// file paths and the application layer decides when to write.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Pretrained model download
pub mod hub;

/// Tokenizer loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// Config and evaluation JSON
pub mod run_store;

/// Train vs validation loss chart
pub mod plot;
