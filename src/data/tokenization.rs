// ============================================================
// Layer 4 — Tokenization Stage
// ============================================================
// Turns (sentence, proposal) text pairs into fixed-length
// integer sequences for the encoder-decoder model.
//
// Source side (encoder input), length = max_source_len (128):
//   input_ids      : sentence tokens, </s>, then <pad>...
//   attention_mask : 1 for real tokens, 0 for padding
//
// Target side (decoder labels), length = max_target_len (256):
//   labels         : proposal tokens, </s>, then -100...
//
// Why -100 in the labels?
//   Padding is not part of the answer. If padded positions
//   were scored, the model would be rewarded for predicting
//   <pad> over and over, which corrupts the loss signal. Every
//   position holding IGNORE_INDEX is excluded from the loss.
//
// Truncation keeps room for the closing </s> token, so an
// over-long text becomes (cap - 1) tokens followed by </s>.
//
// Reference: Raffel et al. (2020) T5 paper
//            tokenizers crate documentation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::domain::proposal::ProposalPair;

/// Label value marking a position the loss must skip
pub const IGNORE_INDEX: i64 = -100;

/// One fully tokenised and padded training pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedExample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels:         Vec<i64>,
}

impl TokenizedExample {
    /// Number of label positions that count towards the loss
    pub fn target_len(&self) -> usize {
        self.labels.iter().filter(|&&l| l != IGNORE_INDEX).count()
    }
}

/// Wraps the model's tokenizer with the fixed sequence caps and
/// the special token ids the encoder-decoder model relies on.
#[derive(Clone)]
pub struct Seq2SeqTokenizer {
    tokenizer:      Tokenizer,
    pad_id:         u32,
    eos_id:         u32,
    max_source_len: usize,
    max_target_len: usize,
}

impl Seq2SeqTokenizer {
    /// Build from a tokenizer that defines `<pad>` and `</s>`.
    pub fn new(tokenizer: Tokenizer, max_source_len: usize, max_target_len: usize) -> Result<Self> {
        let pad_id = tokenizer
            .token_to_id("<pad>")
            .context("Tokenizer has no '<pad>' token")?;
        let eos_id = tokenizer
            .token_to_id("</s>")
            .context("Tokenizer has no '</s>' token")?;

        Ok(Self { tokenizer, pad_id, eos_id, max_source_len, max_target_len })
    }

    pub fn pad_id(&self) -> u32 { self.pad_id }

    pub fn eos_id(&self) -> u32 { self.eos_id }

    pub fn max_source_len(&self) -> usize { self.max_source_len }

    pub fn max_target_len(&self) -> usize { self.max_target_len }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// Encode `text` to at most `cap` ids, always ending in </s>.
    /// No padding is added.
    pub fn encode_truncated(&self, text: &str, cap: usize) -> Result<Vec<u32>> {
        if cap == 0 {
            return Ok(Vec::new());
        }

        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        ids.truncate(cap - 1);
        ids.push(self.eos_id);
        Ok(ids)
    }

    /// Encoder input: (input_ids, attention_mask), both max_source_len long
    pub fn encode_source(&self, text: &str) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut ids  = self.encode_truncated(text, self.max_source_len)?;
        let mut mask = vec![1u32; ids.len()];

        ids.resize(self.max_source_len, self.pad_id);
        mask.resize(self.max_source_len, 0);
        Ok((ids, mask))
    }

    /// Decoder labels, max_target_len long, padding = IGNORE_INDEX
    pub fn encode_target(&self, text: &str) -> Result<Vec<i64>> {
        let mut labels: Vec<i64> = self
            .encode_truncated(text, self.max_target_len)?
            .into_iter()
            .map(i64::from)
            .collect();

        labels.resize(self.max_target_len, IGNORE_INDEX);
        Ok(labels)
    }

    pub fn encode_pair(&self, pair: &ProposalPair) -> Result<TokenizedExample> {
        let (input_ids, attention_mask) = self.encode_source(&pair.source)?;
        let labels = self.encode_target(&pair.target)?;
        Ok(TokenizedExample { input_ids, attention_mask, labels })
    }

    /// Decode ids back to text, dropping special tokens
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| anyhow::anyhow!("Decoding error: {e}"))
    }

    /// Decode a label row, skipping IGNORE_INDEX positions
    pub fn decode_labels(&self, labels: &[i64]) -> Result<String> {
        let ids: Vec<u32> = labels
            .iter()
            .filter(|&&l| l >= 0)
            .map(|&l| l as u32)
            .collect();
        self.decode(&ids)
    }
}

/// Tokenise every pair, stopping at the first failure.
pub fn tokenize_all(tokenizer: &Seq2SeqTokenizer, pairs: &[ProposalPair]) -> Result<Vec<TokenizedExample>> {
    pairs.iter().map(|p| tokenizer.encode_pair(p)).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::{Example, Sentiment};
    use crate::infra::tokenizer_store::word_level_tokenizer;

    fn vocab_of(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    fn normalise(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn proposal_pair() -> ProposalPair {
        let example = Example::new(
            "a stirring, funny and finally transporting re-imagining",
            Sentiment::Positive,
            0,
        );
        ProposalPair::from_example(&example)
    }

    #[test]
    fn test_round_trip_without_truncation() {
        let pair = proposal_pair();
        let tok  = Seq2SeqTokenizer::new(word_level_tokenizer(&vocab_of(&pair.target)), 128, 256).unwrap();

        let labels  = tok.encode_target(&pair.target).unwrap();
        let decoded = tok.decode_labels(&labels).unwrap();
        assert_eq!(decoded, normalise(&pair.target));
    }

    #[test]
    fn test_round_trip_with_truncation() {
        let pair = proposal_pair();
        let tok  = Seq2SeqTokenizer::new(word_level_tokenizer(&vocab_of(&pair.target)), 8, 8).unwrap();

        let labels  = tok.encode_target(&pair.target).unwrap();
        let decoded = tok.decode_labels(&labels).unwrap();

        // cap 8 → 7 content tokens + </s>
        let expected: Vec<&str> = pair.target.split_whitespace().take(7).collect();
        assert_eq!(decoded, expected.join(" "));
        assert_eq!(labels.len(), 8);
        assert_eq!(labels[7], 1);
    }

    #[test]
    fn test_target_padding_is_ignored() {
        let tok    = Seq2SeqTokenizer::new(word_level_tokenizer(&["good", "movie"]), 6, 6).unwrap();
        let labels = tok.encode_target("good movie").unwrap();
        assert_eq!(labels, vec![3, 4, 1, IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX]);
    }

    #[test]
    fn test_source_padding_and_mask() {
        let tok = Seq2SeqTokenizer::new(word_level_tokenizer(&["good", "movie"]), 5, 5).unwrap();
        let (ids, mask) = tok.encode_source("good movie").unwrap();
        assert_eq!(ids,  vec![3, 4, 1, 0, 0]);
        assert_eq!(mask, vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_pair_lengths_are_fixed() {
        let pair = proposal_pair();
        let tok  = Seq2SeqTokenizer::new(word_level_tokenizer(&vocab_of(&pair.target)), 128, 256).unwrap();
        let ex   = tok.encode_pair(&pair).unwrap();

        assert_eq!(ex.input_ids.len(),      128);
        assert_eq!(ex.attention_mask.len(), 128);
        assert_eq!(ex.labels.len(),         256);
        assert_eq!(ex.target_len(), pair.target.split_whitespace().count() + 1);
    }

    #[test]
    fn test_zero_cap_gives_empty() {
        let tok = Seq2SeqTokenizer::new(word_level_tokenizer(&["x"]), 4, 4).unwrap();
        assert!(tok.encode_truncated("x x x", 0).unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_all_preserves_order() {
        let tok = Seq2SeqTokenizer::new(word_level_tokenizer(&["a", "b"]), 4, 4).unwrap();
        let pairs = vec![
            ProposalPair { source: "a".into(), target: "b".into() },
            ProposalPair { source: "b".into(), target: "a".into() },
        ];
        let out = tokenize_all(&tok, &pairs).unwrap();
        assert_eq!(out[0].input_ids[0], 3);
        assert_eq!(out[1].input_ids[0], 4);
    }
}
