// ============================================================
// Layer 4 — Seq2Seq Dataset
// ============================================================
// Wraps the tokenised examples of one split so Burn's
// DataLoader can index into them.
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::Dataset;

use crate::data::tokenization::TokenizedExample;

pub struct Seq2SeqDataset {
    samples: Vec<TokenizedExample>,
}

impl Seq2SeqDataset {
    pub fn new(samples: Vec<TokenizedExample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<TokenizedExample> for Seq2SeqDataset {
    fn get(&self, index: usize) -> Option<TokenizedExample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(first: u32) -> TokenizedExample {
        TokenizedExample {
            input_ids:      vec![first, 1, 0],
            attention_mask: vec![1, 1, 0],
            labels:         vec![5, 1, -100],
        }
    }

    #[test]
    fn test_indexing() {
        let ds = Seq2SeqDataset::new(vec![sample(3), sample(4)]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(1).unwrap().input_ids[0], 4);
        assert!(ds.get(2).is_none());
    }
}
