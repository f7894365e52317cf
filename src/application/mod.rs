// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (fine-tuning or previewing a proposal).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - File and network access goes through Layer 4 and 6
//   - Only workflow coordination, plus the run's progress
//     output on stdout
//
// Think of this layer as the "director": it tells other
// layers what to do but doesn't do the work itself.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The five-stage fine-tuning workflow
pub mod finetune_use_case;

// Offline template preview
pub mod propose_use_case;
