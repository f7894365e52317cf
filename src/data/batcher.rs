// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a
// Vec<TokenizedExample> into tensors for the encoder-decoder.
//
// How batching works here:
//   Input:  N examples, sources of length S, labels of length T
//   Output: Seq2SeqBatch with
//             input_ids         [N, S]  Int
//             attention_mask    [N, S]  Int
//             decoder_input_ids [N, T]  Int
//             labels            [N, T]  Int
//             label_mask        [N, T]  Float
//
// Teacher forcing:
//   The decoder is fed the target shifted one step to the
//   right, starting with the decoder start token (<pad> = 0
//   for T5). At step t it sees the true tokens 0..t-1 and is
//   asked to predict token t:
//
//     labels            : [ A   B   C  </s> -100 -100 ]
//     decoder_input_ids : [ 0   A   B   C   </s>  0   ]
//
// Label masking:
//   Positions holding IGNORE_INDEX become 0 in `labels` so
//   they can be used with gather(), and 0.0 in `label_mask`
//   so they add nothing to the loss.
//
// Reference: Burn Book §4 (Batcher)
//            Raffel et al. (2020) T5 paper

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::tokenization::{TokenizedExample, IGNORE_INDEX};

// ─── Seq2SeqBatch ─────────────────────────────────────────────────────────────
/// A batch of tokenised pairs ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// Encoder token ids — shape: [batch_size, source_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — shape: [batch_size, source_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// Shifted target fed to the decoder — shape: [batch_size, target_len]
    pub decoder_input_ids: Tensor<B, 2, Int>,

    /// Token to predict at each position — shape: [batch_size, target_len]
    pub labels: Tensor<B, 2, Int>,

    /// 1.0 where the label counts towards the loss — shape: [batch_size, target_len]
    pub label_mask: Tensor<B, 2>,
}

// ─── Seq2SeqBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher {
    decoder_start_id: u32,
    pad_id:           u32,
}

impl Seq2SeqBatcher {
    pub fn new(decoder_start_id: u32, pad_id: u32) -> Self {
        Self { decoder_start_id, pad_id }
    }
}

/// Shift a label row one step right for teacher forcing.
/// IGNORE_INDEX entries are replaced by `pad_id`.
pub fn shift_right(labels: &[i64], decoder_start_id: u32, pad_id: u32) -> Vec<i64> {
    if labels.is_empty() {
        return Vec::new();
    }

    let mut shifted = Vec::with_capacity(labels.len());
    shifted.push(decoder_start_id as i64);
    shifted.extend(labels[..labels.len() - 1].iter().map(|&l| {
        if l == IGNORE_INDEX { pad_id as i64 } else { l }
    }));
    shifted
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<B, TokenizedExample, Seq2SeqBatch<B>> for Seq2SeqBatcher {
    fn batch(&self, items: Vec<TokenizedExample>, device: &B::Device) -> Seq2SeqBatch<B> {
        let batch_size = items.len();
        // All sequences are pre-padded to the same caps
        let source_len = items.first().map_or(0, |s| s.input_ids.len());
        let target_len = items.first().map_or(0, |s| s.labels.len());

        // ── Flatten the encoder side ──────────────────────────────────────────
        let input_flat: Vec<i64> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i64))
            .collect();

        let mask_flat: Vec<i64> = items
            .iter()
            .flat_map(|s| s.attention_mask.iter().map(|&x| x as i64))
            .collect();

        // ── Flatten the decoder side ──────────────────────────────────────────
        let decoder_flat: Vec<i64> = items
            .iter()
            .flat_map(|s| shift_right(&s.labels, self.decoder_start_id, self.pad_id))
            .collect();

        let labels_flat: Vec<i64> = items
            .iter()
            .flat_map(|s| s.labels.iter().map(|&l| if l == IGNORE_INDEX { 0 } else { l }))
            .collect();

        let label_mask_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.labels.iter().map(|&l| if l == IGNORE_INDEX { 0.0 } else { 1.0 }))
            .collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let int_tensor = |flat: Vec<i64>, len: usize| {
            Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [batch_size, len]), device)
        };

        Seq2SeqBatch {
            input_ids:         int_tensor(input_flat, source_len),
            attention_mask:    int_tensor(mask_flat, source_len),
            decoder_input_ids: int_tensor(decoder_flat, target_len),
            labels:            int_tensor(labels_flat, target_len),
            label_mask:        Tensor::<B, 2>::from_data(
                TensorData::new(label_mask_flat, [batch_size, target_len]),
                device,
            ),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn example() -> TokenizedExample {
        TokenizedExample {
            input_ids:      vec![7, 8, 1, 0],
            attention_mask: vec![1, 1, 1, 0],
            labels:         vec![5, 6, 1, IGNORE_INDEX, IGNORE_INDEX],
        }
    }

    #[test]
    fn test_shift_right() {
        let shifted = shift_right(&[5, 6, 1, IGNORE_INDEX, IGNORE_INDEX], 0, 0);
        assert_eq!(shifted, vec![0, 5, 6, 1, 0]);
        assert!(shift_right(&[], 0, 0).is_empty());
    }

    #[test]
    fn test_batch_shapes() {
        let device  = Default::default();
        let batcher = Seq2SeqBatcher::new(0, 0);
        let batch: Seq2SeqBatch<TestBackend> =
            batcher.batch(vec![example(), example(), example()], &device);

        assert_eq!(batch.input_ids.dims(),         [3, 4]);
        assert_eq!(batch.attention_mask.dims(),    [3, 4]);
        assert_eq!(batch.decoder_input_ids.dims(), [3, 5]);
        assert_eq!(batch.labels.dims(),            [3, 5]);
        assert_eq!(batch.label_mask.dims(),        [3, 5]);
    }

    #[test]
    fn test_ignored_labels_are_masked() {
        let device  = Default::default();
        let batcher = Seq2SeqBatcher::new(0, 0);
        let batch: Seq2SeqBatch<TestBackend> = batcher.batch(vec![example()], &device);

        let labels: Vec<i64> = batch.labels.into_data().iter::<i64>().collect();
        let mask:   Vec<f32> = batch.label_mask.into_data().iter::<f32>().collect();
        assert_eq!(labels, vec![5, 6, 1, 0, 0]);
        assert_eq!(mask,   vec![1.0, 1.0, 1.0, 0.0, 0.0]);
    }
}
