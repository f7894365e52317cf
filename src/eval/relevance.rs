// ============================================================
// Layer 5 — Relevance
// ============================================================
// Structural conformance of the generated text: a prediction
// counts only when it contains every section marker
// ("Problem:", "Hypothesis:", "Methodology:"). Order and
// section content are not checked.

use crate::domain::proposal::SECTION_MARKERS;

pub fn has_all_sections(text: &str) -> bool {
    SECTION_MARKERS.iter().all(|marker| text.contains(marker))
}

/// Fraction of predictions with all three markers; 0 for none.
pub fn relevance(predictions: &[String]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let hits = predictions.iter().filter(|p| has_all_sections(p)).count();
    hits as f64 / predictions.len() as f64
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::Sentiment;
    use crate::domain::proposal::ProposalRecord;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rendered_records_are_fully_relevant() {
        let preds = vec![
            ProposalRecord::from_parts("a gripping film", Sentiment::Positive).render(),
            ProposalRecord::from_parts("dull", Sentiment::Negative).render(),
        ];
        assert_eq!(relevance(&preds), 1.0);
    }

    #[test]
    fn test_no_markers_is_zero() {
        assert_eq!(relevance(&strings(&["positive", "a movie review"])), 0.0);
    }

    #[test]
    fn test_partial_markers_do_not_count() {
        let preds = strings(&[
            "Problem: x Hypothesis: y",
            "Problem: x Hypothesis: y Methodology: z",
            "Methodology: z",
            "problem: x hypothesis: y methodology: z",
        ]);
        assert_eq!(relevance(&preds), 0.25);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(relevance(&[]), 0.0);
    }
}
