// ============================================================
// Layer 3 — Proposal Record Domain Type
// ============================================================
// The "research proposal" the model learns to write.
//
// A record always has exactly three sections, in this order:
//
//   Problem:     Analyze sentiment in short texts like: '<sentence>'
//   Hypothesis:  The <positive|negative> sentiment can be detected ...
//   Methodology: Use a transformer-based model with fine-tuning ...
//
// The record is built by template substitution only. There is
// no randomness and no external state, so calling the template
// twice on the same input yields byte-identical text.
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::example::{Example, Sentiment};

/// Section marker that opens the first line
pub const PROBLEM_MARKER: &str = "Problem:";
/// Section marker that opens the second line
pub const HYPOTHESIS_MARKER: &str = "Hypothesis:";
/// Section marker that opens the third line
pub const METHODOLOGY_MARKER: &str = "Methodology:";

/// All three markers in their required order
pub const SECTION_MARKERS: [&str; 3] = [PROBLEM_MARKER, HYPOTHESIS_MARKER, METHODOLOGY_MARKER];

const METHODOLOGY_TEXT: &str =
    "Use a transformer-based model with fine-tuning on short-text datasets.";

/// A three-section proposal built from one labelled sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub problem:     String,
    pub hypothesis:  String,
    pub methodology: String,
}

impl ProposalRecord {
    /// Build the proposal for a sentence and its sentiment.
    pub fn from_parts(sentence: &str, label: Sentiment) -> Self {
        Self {
            problem: format!("Analyze sentiment in short texts like: '{sentence}'"),
            hypothesis: format!(
                "The {} sentiment can be detected using contextual embeddings.",
                label.as_word()
            ),
            methodology: METHODOLOGY_TEXT.to_string(),
        }
    }

    pub fn from_example(example: &Example) -> Self {
        Self::from_parts(&example.sentence, example.label)
    }

    /// Render the record as the training target string
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProposalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PROBLEM_MARKER} {}\n{HYPOTHESIS_MARKER} {}\n{METHODOLOGY_MARKER} {}",
            self.problem, self.hypothesis, self.methodology
        )
    }
}

/// The (source, target) text pair fed to the tokenizer.
/// The source is the raw sentence, the target the rendered proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPair {
    pub source: String,
    pub target: String,
}

impl ProposalPair {
    pub fn from_example(example: &Example) -> Self {
        Self {
            source: example.sentence.clone(),
            target: ProposalRecord::from_example(example).render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STIRRING: &str = "a stirring, funny and finally transporting re-imagining";

    #[test]
    fn test_exact_positive_target() {
        let text = ProposalRecord::from_parts(STIRRING, Sentiment::Positive).render();
        assert_eq!(
            text,
            "Problem: Analyze sentiment in short texts like: \
             'a stirring, funny and finally transporting re-imagining'\n\
             Hypothesis: The positive sentiment can be detected using contextual embeddings.\n\
             Methodology: Use a transformer-based model with fine-tuning on short-text datasets."
        );
    }

    #[test]
    fn test_negative_hypothesis() {
        let record = ProposalRecord::from_parts("dull and lifeless", Sentiment::Negative);
        assert_eq!(
            record.hypothesis,
            "The negative sentiment can be detected using contextual embeddings."
        );
    }

    #[test]
    fn test_template_is_idempotent() {
        for (sentence, label) in [
            (STIRRING, Sentiment::Positive),
            ("", Sentiment::Negative),
            ("it's 'quoted' text", Sentiment::Positive),
        ] {
            let first  = ProposalRecord::from_parts(sentence, label).render();
            let second = ProposalRecord::from_parts(sentence, label).render();
            assert_eq!(first.as_bytes(), second.as_bytes());
        }
    }

    #[test]
    fn test_exactly_one_marker_each_in_order() {
        for (sentence, label) in [
            (STIRRING, Sentiment::Positive),
            ("a bleak , joyless slog", Sentiment::Negative),
            ("", Sentiment::Positive),
        ] {
            let text = ProposalRecord::from_parts(sentence, label).render();

            let positions: Vec<usize> = SECTION_MARKERS
                .iter()
                .map(|m| {
                    assert_eq!(text.matches(m).count(), 1, "marker {m} in {text:?}");
                    text.find(m).unwrap()
                })
                .collect();

            assert!(positions.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(text.lines().count(), 3);
        }
    }

    #[test]
    fn test_pair_keeps_sentence_as_source() {
        let example = Example::new(STIRRING, Sentiment::Positive, 7);
        let pair    = ProposalPair::from_example(&example);
        assert_eq!(pair.source, STIRRING);
        assert!(pair.target.starts_with(PROBLEM_MARKER));
    }
}
