// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `finetune` — LoRA fine-tune, generate, score
//   2. `propose`  — print the template proposal for a sentence
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, FinetuneArgs, ProposeArgs};

#[derive(Parser, Debug)]
#[command(
    name = "proposal-lora",
    version = "0.1.0",
    about = "LoRA fine-tune FLAN-T5 to turn sentences into Problem/Hypothesis/Methodology proposals."
)]
pub struct Cli {
    /// The subcommand to run (finetune or propose)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the use case; the CLI layer never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Finetune(args) => run_finetune(args),
            Commands::Propose(args)  => run_propose(args),
        }
    }
}

fn run_finetune(args: FinetuneArgs) -> Result<()> {
    use crate::application::finetune_use_case::FinetuneUseCase;

    tracing::info!("Fine-tuning '{}' on {}/{}", args.model_id, args.dataset, args.subset);

    let use_case = FinetuneUseCase::new(args.into());
    let outcome  = use_case.execute()?;

    println!(
        "Fine-tuning complete: {} epochs, {} test predictions scored.",
        outcome.history.len(),
        outcome.report.num_predictions,
    );
    Ok(())
}

fn run_propose(args: ProposeArgs) -> Result<()> {
    use crate::application::propose_use_case::ProposeUseCase;

    let proposal = ProposeUseCase::new(args.sentence, args.label).execute()?;
    println!("{proposal}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::finetune_use_case::FinetuneConfig;

    #[test]
    fn test_finetune_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["proposal-lora", "finetune"]).unwrap();
        let Commands::Finetune(args) = cli.command else { panic!("expected finetune") };

        let from_cli: FinetuneConfig = args.into();
        let defaults = FinetuneConfig::default();
        assert_eq!(
            serde_json::to_value(&from_cli).unwrap(),
            serde_json::to_value(&defaults).unwrap(),
        );
    }

    #[test]
    fn test_finetune_flags() {
        let cli = Cli::try_parse_from([
            "proposal-lora", "finetune",
            "--lora-targets", "q,k,v",
            "--max-examples", "200",
            "--learning-rate", "0.001",
            "--cpu",
        ]).unwrap();
        let Commands::Finetune(args) = cli.command else { panic!("expected finetune") };

        let cfg: FinetuneConfig = args.into();
        assert_eq!(cfg.lora_targets, vec!["q", "k", "v"]);
        assert_eq!(cfg.max_examples, Some(200));
        assert_eq!(cfg.learning_rate, Some(0.001));
        assert!(cfg.cpu);
    }

    #[test]
    fn test_propose_requires_sentence() {
        assert!(Cli::try_parse_from(["proposal-lora", "propose"]).is_err());
        let cli = Cli::try_parse_from(["proposal-lora", "propose", "--sentence", "dull", "--label", "0"]).unwrap();
        assert!(matches!(cli.command, Commands::Propose(ProposeArgs { label: 0, .. })));
    }
}
