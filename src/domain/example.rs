// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One labelled sentence from the sentiment corpus.
//
// The corpus stores the label as an integer (0 = negative,
// 1 = positive). We lift it into an enum at the boundary so
// nothing downstream has to guess what "1" means.
//
// Reference: Rust Book §6 (Enums), §9 (Error Handling)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Binary sentiment of a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Negative,
    Positive,
}

impl Sentiment {
    /// Convert the corpus' integer label into a Sentiment.
    /// Anything other than 0 or 1 is a corrupt row.
    pub fn from_label(label: i64) -> Result<Self> {
        match label {
            0 => Ok(Sentiment::Negative),
            1 => Ok(Sentiment::Positive),
            other => bail!("Unexpected sentiment label {other} (expected 0 or 1)"),
        }
    }

    /// The lower-case word used inside the proposal template
    pub fn as_word(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Positive => "positive",
        }
    }
}

/// A raw (sentence, label) pair. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// The sentence text exactly as stored in the corpus
    pub sentence: String,

    /// Binary sentiment label
    pub label: Sentiment,

    /// Row index in the source corpus, kept for traceability
    pub index: i64,
}

impl Example {
    pub fn new(sentence: impl Into<String>, label: Sentiment, index: i64) -> Self {
        Self {
            sentence: sentence.into(),
            label,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mapping() {
        assert_eq!(Sentiment::from_label(0).unwrap(), Sentiment::Negative);
        assert_eq!(Sentiment::from_label(1).unwrap(), Sentiment::Positive);
    }

    #[test]
    fn test_rejects_unknown_label() {
        assert!(Sentiment::from_label(2).is_err());
        assert!(Sentiment::from_label(-1).is_err());
    }

    #[test]
    fn test_sentiment_words() {
        assert_eq!(Sentiment::Positive.as_word(), "positive");
        assert_eq!(Sentiment::Negative.as_word(), "negative");
    }
}
