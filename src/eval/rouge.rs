// ============================================================
// Layer 5 — ROUGE
// ============================================================
// Overlap between a generated proposal and its reference.
//
//   ROUGE-N   clipped n-gram matches
//               P = matches / hypothesis n-grams
//               R = matches / reference n-grams
//   ROUGE-L   longest common subsequence (LCS) of tokens
//               P = LCS / |hypothesis|,  R = LCS / |reference|
//
//   F = 2PR / (P + R)
//
// Tokens are produced the way the ROUGE scoring package does
// it: lower-case, every non-alphanumeric character becomes a
// space, then split on whitespace. So "Problem: Analyze" and
// "problem analyze" score as identical.
//
// Reference: Lin (2004) ROUGE: A Package for Automatic
//            Evaluation of Summaries

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Corpus-level F-measures, each the mean over all pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeScores {
    pub rouge1: f64,
    pub rouge2: f64,
    pub rouge_l: f64,
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn extract_ngrams(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n > 0 && tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

fn f_measure(overlap: usize, hyp_total: usize, ref_total: usize) -> f64 {
    if overlap == 0 || hyp_total == 0 || ref_total == 0 {
        return 0.0;
    }
    let precision = overlap as f64 / hyp_total as f64;
    let recall    = overlap as f64 / ref_total as f64;
    2.0 * precision * recall / (precision + recall)
}

/// ROUGE-N F-measure in [0, 1]
pub fn rouge_n(reference: &str, hypothesis: &str, n: usize) -> f64 {
    let ref_tokens = tokenize(reference);
    let hyp_tokens = tokenize(hypothesis);

    let ref_ngrams = extract_ngrams(&ref_tokens, n);
    let hyp_ngrams = extract_ngrams(&hyp_tokens, n);

    let overlap: usize = hyp_ngrams
        .iter()
        .map(|(ngram, &count)| count.min(ref_ngrams.get(ngram).copied().unwrap_or(0)))
        .sum();

    f_measure(
        overlap,
        hyp_ngrams.values().sum(),
        ref_ngrams.values().sum(),
    )
}

/// ROUGE-L F-measure in [0, 1]
pub fn rouge_l(reference: &str, hypothesis: &str) -> f64 {
    let ref_tokens = tokenize(reference);
    let hyp_tokens = tokenize(hypothesis);
    let lcs        = lcs_length(&ref_tokens, &hyp_tokens);
    f_measure(lcs, hyp_tokens.len(), ref_tokens.len())
}

/// Two-row dynamic programme, O(|a|·|b|) time, O(|b|) memory
fn lcs_length(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Mean ROUGE-1/2/L over aligned (prediction, reference) pairs.
/// Extra entries on the longer side are ignored; no pairs → all zero.
pub fn corpus_rouge(predictions: &[String], references: &[String]) -> RougeScores {
    let pairs = predictions.len().min(references.len());
    if pairs == 0 {
        return RougeScores::default();
    }

    let mut total = RougeScores::default();
    for (prediction, reference) in predictions.iter().zip(references) {
        total.rouge1  += rouge_n(reference, prediction, 1);
        total.rouge2  += rouge_n(reference, prediction, 2);
        total.rouge_l += rouge_l(reference, prediction);
    }

    let n = pairs as f64;
    RougeScores {
        rouge1:  total.rouge1 / n,
        rouge2:  total.rouge2 / n,
        rouge_l: total.rouge_l / n,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_tokenize_drops_punctuation_and_case() {
        assert_eq!(
            tokenize("Problem: Analyze 'IT', now!"),
            vec!["problem", "analyze", "it", "now"],
        );
    }

    #[test]
    fn test_identical_texts_score_one() {
        let text = "Problem: Analyze sentiment in short texts";
        assert!(close(rouge_n(text, text, 1), 1.0));
        assert!(close(rouge_n(text, text, 2), 1.0));
        assert!(close(rouge_l(text, text), 1.0));
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        assert_eq!(rouge_n("red green", "blue yellow", 1), 0.0);
        assert_eq!(rouge_l("red green", "blue yellow"), 0.0);
    }

    #[test]
    fn test_partial_unigram_overlap() {
        // 2 of 3 hypothesis tokens match, reference has 4 → P=2/3, R=1/2
        let f = rouge_n("the cat sat down", "the cat ran", 1);
        assert!(close(f, 2.0 * (2.0 / 3.0) * 0.5 / (2.0 / 3.0 + 0.5)));
    }

    #[test]
    fn test_repeated_ngrams_are_clipped() {
        // hypothesis says "the" three times, reference only once
        let f = rouge_n("the cat", "the the the", 1);
        assert!(close(f, 2.0 * (1.0 / 3.0) * 0.5 / (1.0 / 3.0 + 0.5)));
    }

    #[test]
    fn test_rouge_l_respects_order() {
        // LCS of "a b c d" and "a c b d" is 3
        let f = rouge_l("a b c d", "a c b d");
        assert!(close(f, 0.75));
        assert_eq!(lcs_length(&tokenize("a b c d"), &tokenize("d c b a")), 1);
    }

    #[test]
    fn test_short_texts_have_no_bigrams() {
        assert_eq!(rouge_n("word", "word", 2), 0.0);
        assert_eq!(rouge_n("", "", 1), 0.0);
    }

    #[test]
    fn test_corpus_rouge_averages_pairs() {
        let predictions = vec!["a b".to_string(), "x y".to_string()];
        let references  = vec!["a b".to_string(), "p q".to_string()];
        let scores = corpus_rouge(&predictions, &references);
        assert!(close(scores.rouge1, 0.5));
        assert!(close(scores.rouge2, 0.5));
        assert!(close(scores.rouge_l, 0.5));

        assert_eq!(corpus_rouge(&[], &[]), RougeScores::default());
    }
}
