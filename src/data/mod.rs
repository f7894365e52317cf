// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from the raw sentiment corpus
// all the way to tensor batches for the encoder-decoder.
//
// The pipeline flows in this order:
//
//   Hugging Face hub (glue / sst2)
//       │
//       ▼
//   Sst2Loader          → downloads and reads labelled sentences
//       │
//       ▼
//   ProposalPair        → (domain) sentence + templated proposal
//       │
//       ▼
//   split_three_way     → 80 / 10 / 10, seeded shuffle
//       │
//       ▼
//   Seq2SeqTokenizer    → ids, masks and -100 padded labels
//       │
//       ▼
//   Seq2SeqDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   Seq2SeqBatcher      → stacks samples, shifts decoder input
//       │
//       ▼
//   DataLoader          → feeds batches to the training loop
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Loads the labelled sentence corpus via Burn's Hugging Face loader
pub mod loader;

/// Shuffles and splits data into train/validation/test sets
pub mod splitter;

/// Converts text pairs into padded id sequences
pub mod tokenization;

/// Implements Burn's Dataset trait for tokenised pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
