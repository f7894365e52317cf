// ============================================================
// Layer 2 — FinetuneUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Stage 1: Load the sentiment corpus       (Layer 4 - data)
//   Stage 2: Build template proposal targets (Layer 3 - domain)
//   Stage 3: Split train / validation / test (Layer 4 - data)
//   Stage 4: Fetch tokenizer + pretrained T5,
//            freeze it, attach LoRA          (Layer 6 + Layer 5)
//   Stage 5: Train, generate on the test set,
//            score and save artefacts        (Layer 5 + Layer 6)
//
// The stages run strictly one after another. Stage 1 and the
// model/tokenizer part of stage 4 are the two guarded failure
// points: their errors carry a diagnostic and end the run.
// Everything else propagates unchanged.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::{AutodiffModule, Module},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    batcher::{Seq2SeqBatch, Seq2SeqBatcher},
    dataset::Seq2SeqDataset,
    loader::Sst2Loader,
    splitter::split_three_way,
    tokenization::{tokenize_all, Seq2SeqTokenizer},
};
use crate::domain::{proposal::ProposalPair, traits::ExampleSource};
use crate::eval::{evaluate, EvaluationReport};
use crate::infra::{
    hub::ModelHub,
    metrics::MetricsLogger,
    plot::render_loss_chart,
    run_store::RunStore,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    embedder::EncoderMeanPooler,
    generator::GreedyGenerator,
    lora::LoraConfig,
    t5::{T5Config, T5Model},
    trainer::{train, TrainingHistory, TrainingSettings},
    weights::load_pretrained,
};

/// Predictions printed after generation
const SAMPLES_SHOWN: usize = 3;

// ─── Fine-tuning Configuration ───────────────────────────────────────────────
// Every literal of the pipeline. Serialisable so each run can
// write down exactly what it did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinetuneConfig {
    pub model_id:       String,
    pub dataset:        String,
    pub subset:         String,
    pub lora_rank:      usize,
    pub lora_alpha:     f64,
    pub lora_dropout:   f64,
    pub lora_targets:   Vec<String>,
    pub batch_size:     usize,
    pub max_source_len: usize,
    pub max_target_len: usize,
    pub epochs:         usize,
    pub max_new_tokens: usize,
    pub seed:           u64,
    pub novelty_sample: usize,
    pub learning_rate:  Option<f64>,
    pub max_examples:   Option<usize>,
    pub output_dir:     String,
    pub cpu:            bool,
}

impl Default for FinetuneConfig {
    fn default() -> Self {
        Self {
            model_id:       "google/flan-t5-small".to_string(),
            dataset:        "glue".to_string(),
            subset:         "sst2".to_string(),
            lora_rank:      16,
            lora_alpha:     32.0,
            lora_dropout:   0.05,
            lora_targets:   vec!["q".to_string(), "v".to_string()],
            batch_size:     8,
            max_source_len: 128,
            max_target_len: 256,
            epochs:         5,
            max_new_tokens: 32,
            seed:           42,
            novelty_sample: 100,
            learning_rate:  None,
            max_examples:   None,
            output_dir:     "artifacts".to_string(),
            cpu:            false,
        }
    }
}

impl FinetuneConfig {
    pub fn lora_config(&self) -> LoraConfig {
        LoraConfig::new(self.lora_targets.clone())
            .with_rank(self.lora_rank)
            .with_alpha(self.lora_alpha)
            .with_dropout(self.lora_dropout)
    }

    pub fn training_settings(&self) -> TrainingSettings {
        TrainingSettings {
            epochs:        self.epochs,
            batch_size:    self.batch_size,
            seed:          self.seed,
            learning_rate: self.learning_rate,
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct FinetuneOutcome {
    pub history:     TrainingHistory,
    pub predictions: Vec<String>,
    pub references:  Vec<String>,
    pub report:      EvaluationReport,
}

// ─── FinetuneUseCase ─────────────────────────────────────────────────────────
pub struct FinetuneUseCase {
    config: FinetuneConfig,
}

impl FinetuneUseCase {
    pub fn new(config: FinetuneConfig) -> Self {
        Self { config }
    }

    /// Pick the backend and run the pipeline on it
    pub fn execute(&self) -> Result<FinetuneOutcome> {
        if self.config.cpu {
            let device = NdArrayDevice::Cpu;
            println!("Device: {:?} (ndarray)", device);
            self.run::<Autodiff<NdArray>>(device)
        } else {
            let device = WgpuDevice::default();
            println!("Device: {:?} (wgpu)", device);
            self.run::<Autodiff<Wgpu>>(device)
        }
    }

    fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<FinetuneOutcome> {
        let cfg   = &self.config;
        let store = RunStore::new(&cfg.output_dir)?;
        store.save_config(cfg)?;

        // ── Stage 1: Load the corpus ──────────────────────────────────────────
        let loader   = Sst2Loader::new(&cfg.dataset, &cfg.subset).with_max_examples(cfg.max_examples);
        let examples = loader.load_all()?;
        println!("Dataset: {} rows × 3 columns (sentence, label, idx)", examples.len());

        // ── Stage 2: Template targets ─────────────────────────────────────────
        let pairs: Vec<ProposalPair> = examples.iter().map(ProposalPair::from_example).collect();
        if let Some(first) = pairs.first() {
            tracing::debug!("First target:\n{}", first.target);
        }

        // ── Stage 3: Split 80 / 10 / 10 ───────────────────────────────────────
        let splits = split_three_way(pairs, cfg.seed);
        println!(
            "Split: {} train, {} validation, {} test",
            splits.train.len(),
            splits.validation.len(),
            splits.test.len(),
        );

        // ── Stage 4: Tokenizer + adapter-augmented model ──────────────────────
        let (tokenizer, model_config, model) = self.prepare_model::<B>(&device)?;

        let total     = model.num_params();
        let trainable = model.trainable_params();
        println!(
            "trainable params: {} || all params: {} || trainable%: {:.4}",
            trainable,
            total,
            100.0 * trainable as f64 / total.max(1) as f64,
        );

        let train_ds = Seq2SeqDataset::new(tokenize_all(&tokenizer, &splits.train)?);
        let val_ds   = Seq2SeqDataset::new(tokenize_all(&tokenizer, &splits.validation)?);
        let test_ds  = Seq2SeqDataset::new(tokenize_all(&tokenizer, &splits.test)?);
        tracing::info!(
            "Tokenized {} / {} / {} pairs",
            train_ds.sample_count(),
            val_ds.sample_count(),
            test_ds.sample_count(),
        );

        let batcher = Seq2SeqBatcher::new(model_config.decoder_start_token_id, tokenizer.pad_id());

        // ── Stage 5a: Train ───────────────────────────────────────────────────
        let (model, history) = train(model, train_ds, val_ds, batcher.clone(), &cfg.training_settings())?;

        let metrics = MetricsLogger::new(store.dir())?;
        metrics.log_all(history.epochs())?;

        // ── Stage 5b: Generate on the test split ──────────────────────────────
        let model     = model.valid();
        let generator = GreedyGenerator::new(
            cfg.max_new_tokens,
            model_config.decoder_start_token_id,
            tokenizer.eos_id(),
            tokenizer.pad_id(),
        );
        let test_loader: Arc<dyn DataLoader<B::InnerBackend, Seq2SeqBatch<B::InnerBackend>>> =
            DataLoaderBuilder::new(batcher)
                .batch_size(cfg.batch_size)
                .num_workers(1)
                .build(test_ds);

        let (predictions, references) = generate_all(&model, &generator, &tokenizer, test_loader.as_ref())?;

        println!("\nSample predictions:");
        for (i, (pred, reference)) in predictions.iter().zip(&references).take(SAMPLES_SHOWN).enumerate() {
            println!("[{}] prediction:\n{}\n    reference:\n{}\n", i + 1, pred, reference);
        }

        // ── Stage 5c: Score ───────────────────────────────────────────────────
        let embed_device = model.shared.weight.val().device();
        let embedder     = EncoderMeanPooler::new(&model, &tokenizer, cfg.batch_size, embed_device);
        let report   = evaluate(&predictions, &references, &embedder, cfg.novelty_sample)?;

        println!("\nEvaluation:");
        report.print();
        store.save_evaluation(&report)?;

        if let Some(chart) = render_loss_chart(&history) {
            println!("\n{chart}");
        }
        tracing::info!("Artefacts written to '{}'", store.dir().display());

        Ok(FinetuneOutcome { history, predictions, references, report })
    }

    /// Fetch the pretrained files, load them, freeze the base
    /// weights and attach adapters.
    fn prepare_model<B: AutodiffBackend>(
        &self,
        device: &B::Device,
    ) -> Result<(Seq2SeqTokenizer, T5Config, T5Model<B>)> {
        let cfg = &self.config;
        let hint = || format!("Failed to prepare model '{}'", cfg.model_id);

        let files = ModelHub::new(&cfg.model_id).fetch().with_context(hint)?;

        let tokenizer = TokenizerStore::new(&files.tokenizer).load().with_context(hint)?;
        let tokenizer = Seq2SeqTokenizer::new(tokenizer, cfg.max_source_len, cfg.max_target_len)?;

        let model_config = T5Config::from_file(&files.config).with_context(hint)?;
        let model = model_config.init::<B>(device)?;
        let model = load_pretrained(model, &files.weights).with_context(hint)?;
        tracing::info!("Loaded pretrained weights from '{}'", files.weights.display());

        let model = model.no_grad().with_lora(&cfg.lora_config())?;
        Ok((tokenizer, model_config, model))
    }
}

/// Greedy-decode every test batch. Predictions and references
/// come back aligned 1:1 in loader order.
pub fn generate_all<B: Backend>(
    model:     &T5Model<B>,
    generator: &GreedyGenerator,
    tokenizer: &Seq2SeqTokenizer,
    loader:    &dyn DataLoader<B, Seq2SeqBatch<B>>,
) -> Result<(Vec<String>, Vec<String>)> {
    let mut predictions = Vec::new();
    let mut references  = Vec::new();

    for batch in loader.iter() {
        let [rows, target_len] = batch.labels.dims();
        let generated = generator.generate(model, batch.input_ids, batch.attention_mask);

        // Masked label positions hold <pad>, which decode drops
        let labels: Vec<i64> = batch.labels.into_data().iter::<i64>().collect();

        for (row, ids) in generated.iter().enumerate() {
            predictions.push(tokenizer.decode(ids)?);
            references.push(tokenizer.decode_labels(&labels[row * target_len..(row + 1) * target_len])?);
        }
        tracing::debug!("Generated {} rows, {} so far", rows, predictions.len());
    }

    Ok((predictions, references))
}
