// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn model and training code.
//
// Why isolate it here?
//   - If Burn's API changes, the damage stays in this layer
//     (plus the Dataset/Batcher glue in Layer 4)
//   - Domain and evaluation code stay testable without tensors
//
// What's in this layer:
//
//   t5.rs         — The pretrained encoder-decoder:
//                   • Shared token embeddings
//                   • Relative position bias (bucketed)
//                   • Self / cross attention, no score scaling
//                   • Gated-gelu or relu feed-forward
//                   • RMS layer norms, LM head
//
//   lora.rs       — Low-rank adapters on frozen projections
//
//   weights.rs    — Copies a safetensors checkpoint into the model
//
//   adafactor.rs  — Learning-rate-free optimiser (Burn SimpleOptimizer)
//
//   trainer.rs    — Train + validate loop, per-epoch loss history
//
//   generator.rs  — Greedy autoregressive decoding
//
//   embedder.rs   — Mean-pooled encoder sentence embeddings
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Raffel et al. (2020) T5
//            Hu et al. (2021) LoRA

/// T5 encoder-decoder architecture
pub mod t5;

/// LoRA adapters and the adapted linear projection
pub mod lora;

/// Pretrained weight import from safetensors
pub mod weights;

/// Adafactor optimiser
pub mod adafactor;

/// Training loop with validation
pub mod trainer;

/// Greedy generation
pub mod generator;

/// Sentence embeddings for the novelty score
pub mod embedder;
