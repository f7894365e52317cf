// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `finetune` and `propose`, and
// all their configurable flags. Every flag defaults to the
// value the pipeline was designed around, so a bare
// `proposal-lora finetune` reproduces the reference run.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::finetune_use_case::FinetuneConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune FLAN-T5 with LoRA on SST-2, then generate and score proposals
    Finetune(FinetuneArgs),

    /// Print the template proposal for one sentence
    Propose(ProposeArgs),
}

/// All arguments for the `finetune` command.
#[derive(Args, Debug)]
pub struct FinetuneArgs {
    /// Hugging Face model repository
    #[arg(long, default_value = "google/flan-t5-small")]
    pub model_id: String,

    /// Hugging Face dataset name
    #[arg(long, default_value = "glue")]
    pub dataset: String,

    /// Dataset configuration
    #[arg(long, default_value = "sst2")]
    pub subset: String,

    /// Rank r of the LoRA update
    #[arg(long, default_value_t = 16)]
    pub lora_rank: usize,

    /// LoRA scaling numerator (update scaled by alpha / r)
    #[arg(long, default_value_t = 32.0)]
    pub lora_alpha: f64,

    /// Dropout on the adapter input
    #[arg(long, default_value_t = 0.05)]
    pub lora_dropout: f64,

    /// Attention projections to adapt (q, k, v, o)
    #[arg(long, value_delimiter = ',', default_value = "q,v")]
    pub lora_targets: Vec<String>,

    /// Pairs per training step
    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Source token cap, EOS included
    #[arg(long, default_value_t = 128)]
    pub max_source_len: usize,

    /// Target token cap, EOS included
    #[arg(long, default_value_t = 256)]
    pub max_target_len: usize,

    /// Full passes over the training split
    #[arg(long, default_value_t = 5)]
    pub epochs: usize,

    /// Generation cap per test sentence
    #[arg(long, default_value_t = 32)]
    pub max_new_tokens: usize,

    /// Seed for the split and the per-epoch shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Predictions embedded for the novelty score
    #[arg(long, default_value_t = 100)]
    pub novelty_sample: usize,

    /// Fixed Adafactor learning rate; omit for relative step sizes
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Read only the first N corpus rows
    #[arg(long)]
    pub max_examples: Option<usize>,

    /// Where finetune_config.json, metrics.csv and evaluation.json go
    #[arg(long, default_value = "artifacts")]
    pub output_dir: String,

    /// Run on the ndarray CPU backend instead of wgpu
    #[arg(long)]
    pub cpu: bool,
}

/// Convert CLI FinetuneArgs into the application-layer FinetuneConfig.
/// The application layer never sees clap types.
impl From<FinetuneArgs> for FinetuneConfig {
    fn from(a: FinetuneArgs) -> Self {
        FinetuneConfig {
            model_id:       a.model_id,
            dataset:        a.dataset,
            subset:         a.subset,
            lora_rank:      a.lora_rank,
            lora_alpha:     a.lora_alpha,
            lora_dropout:   a.lora_dropout,
            lora_targets:   a.lora_targets,
            batch_size:     a.batch_size,
            max_source_len: a.max_source_len,
            max_target_len: a.max_target_len,
            epochs:         a.epochs,
            max_new_tokens: a.max_new_tokens,
            seed:           a.seed,
            novelty_sample: a.novelty_sample,
            learning_rate:  a.learning_rate,
            max_examples:   a.max_examples,
            output_dir:     a.output_dir,
            cpu:            a.cpu,
        }
    }
}

/// All arguments for the `propose` command
#[derive(Args, Debug)]
pub struct ProposeArgs {
    /// The sentence to build a proposal for
    #[arg(long)]
    pub sentence: String,

    /// Sentiment label: 0 = negative, 1 = positive
    #[arg(long, default_value_t = 1)]
    pub label: i64,
}
