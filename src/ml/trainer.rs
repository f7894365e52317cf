// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and the
// Adafactor optimiser.
//
// Key Burn insight:
//   - Training runs on B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend,
//     which has no autodiff and disables dropout
//   - The validation loader must also produce InnerBackend
//     batches
//   - Only adapter weights carry require_grad, so the grads
//     handed to the optimiser cover just the LoRA factors
//
// Each epoch is TRAIN then VALIDATE, and the two averages are
// pushed into a TrainingHistory that the caller owns. There
// is no early stopping and nothing is written to disk here.
//
// Reference: Burn Book §5 (Custom Training Loop)
//            Shazeer & Stern (2018) Adafactor

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    batcher::{Seq2SeqBatch, Seq2SeqBatcher},
    dataset::Seq2SeqDataset,
};
use crate::ml::adafactor::AdafactorConfig;
use crate::ml::t5::T5Model;

/// Loop settings taken from the run configuration
#[derive(Debug, Clone)]
pub struct TrainingSettings {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub seed:          u64,
    /// None = Adafactor relative step size
    pub learning_rate: Option<f64>,
}

// ─── Loss history ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLosses {
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
}

/// Per-epoch averages in the order they were produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    epochs: Vec<EpochLosses>,
}

impl TrainingHistory {
    pub fn push(&mut self, losses: EpochLosses) {
        self.epochs.push(losses);
    }

    pub fn epochs(&self) -> &[EpochLosses] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochLosses> {
        self.epochs.last()
    }
}

/// Mean of the batch losses, NaN when there were no batches
fn average(sum: f64, batches: usize) -> f64 {
    if batches > 0 { sum / batches as f64 } else { f64::NAN }
}

pub fn train<B: AutodiffBackend>(
    mut model:     T5Model<B>,
    train_dataset: Seq2SeqDataset,
    val_dataset:   Seq2SeqDataset,
    batcher:       Seq2SeqBatcher,
    settings:      &TrainingSettings,
) -> Result<(T5Model<B>, TrainingHistory)> {
    ensure!(settings.batch_size > 0, "Batch size must be at least 1");

    // ── Adafactor optimiser ───────────────────────────────────────────────────
    let mut optim = AdafactorConfig::for_learning_rate(settings.learning_rate).init();
    // Ignored by Adafactor when it derives its own relative step
    let lr = settings.learning_rate.unwrap_or(0.0);

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    // A fresh permutation every epoch, reproducible from the seed
    let train_loader: Arc<dyn DataLoader<B, Seq2SeqBatch<B>>> = DataLoaderBuilder::new(batcher.clone())
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend, no autodiff overhead) ───────────
    let val_loader: Arc<dyn DataLoader<B::InnerBackend, Seq2SeqBatch<B::InnerBackend>>> =
        DataLoaderBuilder::new(batcher)
            .batch_size(settings.batch_size)
            .num_workers(1)
            .build(val_dataset);

    let mut history = TrainingHistory::default();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=settings.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let (loss, _) = model.forward_loss(batch);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            // Backward pass + Adafactor update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;

        for batch in val_loader.iter() {
            let (loss, _) = model_valid.forward_loss(batch);
            val_loss_sum += loss.into_scalar().elem::<f64>();
            val_batches  += 1;
        }

        let losses = EpochLosses {
            epoch,
            train_loss: average(train_loss_sum, train_batches),
            val_loss:   average(val_loss_sum, val_batches),
        };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4}",
            epoch, settings.epochs, losses.train_loss, losses.val_loss,
        );
        tracing::debug!("Epoch {} done after {} train batches", epoch, train_batches);

        history.push(losses);
    }

    tracing::info!("Training complete!");
    Ok((model, history))
}
