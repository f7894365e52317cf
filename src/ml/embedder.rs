// ============================================================
// Layer 5 — Sentence Embedder
// ============================================================
// Turns sentences into fixed-size vectors by running them
// through the T5 encoder and averaging the hidden states of
// the real (non-padding) tokens:
//
//   e = Σ_t mask_t · h_t  /  Σ_t mask_t
//
// This is the sentence-T5 recipe. The vectors are only ever
// compared with each other (cosine similarity), so the same
// model that generated the texts can embed them.
//
// Reference: Ni et al. (2022) Sentence-T5

use anyhow::Result;
use burn::prelude::*;

use crate::data::tokenization::Seq2SeqTokenizer;
use crate::domain::traits::SentenceEmbedder;
use crate::ml::t5::T5Model;

/// Mean-pooled encoder states of a T5 model
pub struct EncoderMeanPooler<'a, B: Backend> {
    model:      &'a T5Model<B>,
    tokenizer:  &'a Seq2SeqTokenizer,
    batch_size: usize,
    device:     B::Device,
}

impl<'a, B: Backend> EncoderMeanPooler<'a, B> {
    pub fn new(
        model:      &'a T5Model<B>,
        tokenizer:  &'a Seq2SeqTokenizer,
        batch_size: usize,
        device:     B::Device,
    ) -> Self {
        Self { model, tokenizer, batch_size: batch_size.max(1), device }
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let rows    = texts.len();
        let seq_len = self.tokenizer.max_source_len();

        let mut ids  = Vec::with_capacity(rows * seq_len);
        let mut mask = Vec::with_capacity(rows * seq_len);
        for text in texts {
            let (row_ids, row_mask) = self.tokenizer.encode_source(text)?;
            ids.extend(row_ids.into_iter().map(i64::from));
            mask.extend(row_mask.into_iter().map(i64::from));
        }

        let ids  = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [rows, seq_len]), &self.device);
        let mask = Tensor::<B, 2, Int>::from_data(TensorData::new(mask, [rows, seq_len]), &self.device);

        let hidden     = self.model.encode(ids, mask.clone());        // [rows, seq, d]
        let d_model    = hidden.dims()[2];
        let mask_float = mask.float().reshape([rows, seq_len, 1]);   // [rows, seq, 1]

        let summed = (hidden * mask_float.clone().expand([rows, seq_len, d_model])).sum_dim(1);
        let counts = mask_float.sum_dim(1).clamp_min(1e-9);
        let pooled = (summed / counts.expand([rows, 1, d_model])).reshape([rows, d_model]);

        let flat: Vec<f32> = pooled.into_data().iter::<f32>().collect();
        Ok(flat.chunks(d_model).map(|c| c.to_vec()).collect())
    }
}

impl<B: Backend> SentenceEmbedder for EncoderMeanPooler<'_, B> {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_chunk(chunk)?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::word_level_tokenizer;
    use crate::ml::t5::tests::tiny_config;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_one_vector_per_text() {
        let device    = Default::default();
        let model     = tiny_config().init::<TestBackend>(&device).unwrap();
        let tokenizer = Seq2SeqTokenizer::new(word_level_tokenizer(&["good", "bad", "film"]), 6, 6).unwrap();
        let pooler    = EncoderMeanPooler::new(&model, &tokenizer, 2, device);

        let texts: Vec<String> = ["good film", "bad film", "film"].iter().map(|s| s.to_string()).collect();
        let vectors = pooler.embed(&texts).unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 16));
        assert!(vectors.iter().flatten().all(|x| x.is_finite()));
    }

    #[test]
    fn test_identical_texts_embed_identically() {
        let device    = Default::default();
        let model     = tiny_config().init::<TestBackend>(&device).unwrap();
        let tokenizer = Seq2SeqTokenizer::new(word_level_tokenizer(&["good", "film"]), 6, 6).unwrap();
        let pooler    = EncoderMeanPooler::new(&model, &tokenizer, 8, device);

        let vectors = pooler.embed(&["good film".to_string(), "good film".to_string()]).unwrap();
        for (a, b) in vectors[0].iter().zip(&vectors[1]) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
