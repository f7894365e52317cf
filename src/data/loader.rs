// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Loads the GLUE / SST-2 sentiment corpus through Burn's
// HuggingfaceDatasetLoader.
//
// How the loader works:
//   On first use Burn downloads the dataset from the Hugging
//   Face hub and converts it into a local SQLite file. Later
//   runs read straight from that file. Each row comes back as
//   a serde-deserialised struct, one column per field:
//
//     sentence : String   the raw sentence
//     label    : i64      0 = negative, 1 = positive
//     idx      : i64      row index in the corpus
//
// Failure here is fatal for the whole pipeline: there is no
// retry and no alternative corpus is picked automatically.
// The error message only hints at one.
//
// Reference: Burn Book §4 (Datasets)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::data::dataset::{Dataset, HuggingfaceDatasetLoader, SqliteDataset};
use serde::{Deserialize, Serialize};

use crate::domain::example::{Example, Sentiment};
use crate::domain::traits::ExampleSource;

/// One SST-2 row exactly as stored in the SQLite cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sst2Item {
    pub sentence: String,
    pub label:    i64,
    pub idx:      i64,
}

impl TryFrom<Sst2Item> for Example {
    type Error = anyhow::Error;

    fn try_from(item: Sst2Item) -> Result<Self> {
        let label = Sentiment::from_label(item.label)
            .with_context(|| format!("Corrupt row {} in sentiment corpus", item.idx))?;
        Ok(Example::new(item.sentence, label, item.idx))
    }
}

/// Loads the labelled sentence corpus from the Hugging Face hub.
/// Implements the ExampleSource trait from Layer 3.
pub struct Sst2Loader {
    /// Hub dataset name, e.g. "glue"
    dataset: String,
    /// Dataset configuration, e.g. "sst2"
    subset: String,
    /// Split to read; only the training split carries labels
    split: String,
    /// Keep only the first N rows when set
    max_examples: Option<usize>,
}

impl Sst2Loader {
    pub fn new(dataset: impl Into<String>, subset: impl Into<String>) -> Self {
        Self {
            dataset:      dataset.into(),
            subset:       subset.into(),
            split:        "train".to_string(),
            max_examples: None,
        }
    }

    /// Cap the number of rows read from the corpus
    pub fn with_max_examples(mut self, max_examples: Option<usize>) -> Self {
        self.max_examples = max_examples;
        self
    }

    fn open(&self) -> Result<SqliteDataset<Sst2Item>> {
        HuggingfaceDatasetLoader::new(&self.dataset)
            .with_subset(&self.subset)
            .dataset(&self.split)
            .map_err(|e| anyhow::anyhow!("{e:?}"))
            .with_context(|| {
                format!(
                    "Failed to load dataset '{}/{}' (split '{}'). \
                     Check your network connection, or try an alternative \
                     sentiment corpus such as 'rotten_tomatoes'.",
                    self.dataset, self.subset, self.split
                )
            })
    }
}

impl ExampleSource for Sst2Loader {
    fn load_all(&self) -> Result<Vec<Example>> {
        let dataset = self.open()?;
        let limit   = self.max_examples.unwrap_or(usize::MAX).min(dataset.len());

        tracing::info!(
            "Corpus '{}/{}' has {} rows, reading {}",
            self.dataset,
            self.subset,
            dataset.len(),
            limit
        );

        let mut examples = Vec::with_capacity(limit);
        for item in dataset.iter().take(limit) {
            examples.push(Example::try_from(item)?);
        }

        Ok(examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let item = Sst2Item {
            sentence: "hide new secretions from the parental units ".to_string(),
            label:    0,
            idx:      0,
        };
        let example = Example::try_from(item).unwrap();
        assert_eq!(example.label, Sentiment::Negative);
        assert_eq!(example.sentence, "hide new secretions from the parental units ");
        assert_eq!(example.index, 0);
    }

    #[test]
    fn test_row_with_bad_label_is_rejected() {
        let item = Sst2Item { sentence: "x".to_string(), label: -1, idx: 5 };
        let err  = Example::try_from(item).unwrap_err();
        assert!(format!("{err:#}").contains("row 5"));
    }

    #[test]
    fn test_max_examples_builder() {
        let loader = Sst2Loader::new("glue", "sst2").with_max_examples(Some(10));
        assert_eq!(loader.max_examples, Some(10));
        assert_eq!(loader.split, "train");
    }
}
