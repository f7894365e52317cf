// ============================================================
// Layer 2 — ProposeUseCase
// ============================================================
// Builds the template proposal for one sentence, the same text
// the model is trained to produce. Needs no model, no network
// and no files, which makes it handy for checking what the
// training targets look like.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)

use anyhow::{Context, Result};

use crate::domain::{
    example::{Example, Sentiment},
    proposal::ProposalRecord,
};

pub struct ProposeUseCase {
    sentence: String,
    label:    i64,
}

impl ProposeUseCase {
    pub fn new(sentence: impl Into<String>, label: i64) -> Self {
        Self { sentence: sentence.into(), label }
    }

    /// The rendered three-section record
    pub fn execute(&self) -> Result<String> {
        let label = Sentiment::from_label(self.label)
            .context("Invalid --label, use 0 for negative or 1 for positive")?;
        let example = Example::new(self.sentence.clone(), label, 0);
        Ok(ProposalRecord::from_example(&example).render())
    }
}
