// ============================================================
// Layer 5 — Greedy Generator
// ============================================================
// Autoregressive decoding for the encoder-decoder model.
//
// How greedy decoding works:
//   1. Run the encoder once over the source batch
//   2. Start every row with the decoder start token
//   3. Run the decoder over everything generated so far and
//      take the arg-max of the LAST position's logits
//   4. Append it; a row that emits </s> is finished and only
//      receives <pad> from then on
//   5. Stop after max_new_tokens steps, or earlier once every
//      row is finished
//
// The decoder is re-run over the full prefix at every step
// (no key/value cache). With a 32-token cap this costs at
// most 32 short decoder passes per batch.
//
// Reference: Burn Book §3 (Inference)

use burn::prelude::*;

use crate::ml::t5::T5Model;

#[derive(Debug, Clone)]
pub struct GreedyGenerator {
    pub max_new_tokens:   usize,
    pub decoder_start_id: u32,
    pub eos_id:           u32,
    pub pad_id:           u32,
}

impl GreedyGenerator {
    pub fn new(max_new_tokens: usize, decoder_start_id: u32, eos_id: u32, pad_id: u32) -> Self {
        Self { max_new_tokens, decoder_start_id, eos_id, pad_id }
    }

    /// Generated ids per row, start token excluded, at most
    /// max_new_tokens each. A finished row ends with </s>.
    pub fn generate<B: Backend>(
        &self,
        model:          &T5Model<B>,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Vec<Vec<u32>> {
        let device         = input_ids.device();
        let [batch_size, _] = input_ids.dims();
        let encoder_hidden = model.encode(input_ids, attention_mask.clone());

        let mut prefix: Vec<i64>   = vec![self.decoder_start_id as i64; batch_size];
        let mut outputs: Vec<Vec<u32>> = vec![Vec::new(); batch_size];
        let mut finished           = vec![false; batch_size];

        for step in 0..self.max_new_tokens {
            let len = step + 1;
            let decoder_input = Tensor::<B, 2, Int>::from_data(
                TensorData::new(prefix.clone(), [batch_size, len]),
                &device,
            );

            let logits = model.decode(decoder_input, encoder_hidden.clone(), attention_mask.clone());
            let vocab  = logits.dims()[2];
            let next: Vec<i64> = logits
                .slice([0..batch_size, step..len, 0..vocab])
                .reshape([batch_size, vocab])
                .argmax(1)
                .into_data()
                .iter::<i64>()
                .collect();

            // prefix is row-major [batch, len]; rebuild it one column wider
            let mut widened = Vec::with_capacity(batch_size * (len + 1));
            for (row, &token) in next.iter().enumerate() {
                widened.extend_from_slice(&prefix[row * len..(row + 1) * len]);

                let token = if finished[row] { self.pad_id } else { token as u32 };
                if !finished[row] {
                    outputs[row].push(token);
                    finished[row] = token == self.eos_id;
                }
                widened.push(token as i64);
            }
            prefix = widened;

            if finished.iter().all(|&f| f) {
                break;
            }
        }

        outputs
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::t5::tests::tiny_config;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ids(rows: &[&[i64]]) -> Tensor<TestBackend, 2, Int> {
        let len  = rows[0].len();
        let flat = rows.iter().flat_map(|r| r.iter().copied()).collect::<Vec<_>>();
        Tensor::from_data(TensorData::new(flat, [rows.len(), len]), &Default::default())
    }

    #[test]
    fn test_never_exceeds_max_new_tokens() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device).unwrap();

        for cap in [0, 1, 5] {
            let generator = GreedyGenerator::new(cap, 0, 1, 0);
            let out = generator.generate(
                &model,
                ids(&[&[3, 4, 1], &[5, 1, 0]]),
                ids(&[&[1, 1, 1], &[1, 1, 0]]),
            );
            assert_eq!(out.len(), 2);
            assert!(out.iter().all(|row| row.len() <= cap));
        }
    }

    #[test]
    fn test_rows_stop_at_eos() {
        let device = Default::default();
        let model  = tiny_config().init::<TestBackend>(&device).unwrap();

        // declare the model's first pick to be </s>; the row must end there
        let first = GreedyGenerator::new(1, 0, 1, 0)
            .generate(&model, ids(&[&[3, 4, 1]]), ids(&[&[1, 1, 1]]))[0][0];

        let generator = GreedyGenerator::new(8, 0, first, 0);
        let out = generator.generate(&model, ids(&[&[3, 4, 1]]), ids(&[&[1, 1, 1]]));
        assert_eq!(out[0], vec![first]);
    }

    #[test]
    fn test_is_deterministic() {
        let device    = Default::default();
        let model     = tiny_config().init::<TestBackend>(&device).unwrap();
        let generator = GreedyGenerator::new(6, 0, 1, 0);

        let a = generator.generate(&model, ids(&[&[3, 4, 1]]), ids(&[&[1, 1, 1]]));
        let b = generator.generate(&model, ids(&[&[3, 4, 1]]), ids(&[&[1, 1, 1]]));
        assert_eq!(a, b);
    }
}
