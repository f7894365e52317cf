// ============================================================
// Layer 6 — Run Store
// ============================================================
// Writes the JSON artefacts of one fine-tuning run next to the
// metrics CSV:
//
//   <output_dir>/
//     finetune_config.json   ← every setting the run used
//     metrics.csv            ← written by MetricsLogger
//     evaluation.json        ← ROUGE / novelty / relevance
//
// The config is written before training starts, so a crashed
// run still documents what it was doing. No model weights are
// saved; adapters live only for the duration of the run.
//
// Reference: Rust Book §9 (Error Handling)
//            serde_json docs (to_string_pretty)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::finetune_use_case::FinetuneConfig;
use crate::eval::EvaluationReport;

pub const CONFIG_FILE:     &str = "finetune_config.json";
pub const EVALUATION_FILE: &str = "evaluation.json";

pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    /// Create the store, making the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_config(&self, cfg: &FinetuneConfig) -> Result<PathBuf> {
        self.write_json(CONFIG_FILE, cfg)
    }

    pub fn load_config(&self) -> Result<FinetuneConfig> {
        self.read_json(CONFIG_FILE)
    }

    pub fn save_evaluation(&self, report: &EvaluationReport) -> Result<PathBuf> {
        self.write_json(EVALUATION_FILE, report)
    }

    pub fn load_evaluation(&self) -> Result<EvaluationReport> {
        self.read_json(EVALUATION_FILE)
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(path)
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.dir.join(file);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not valid JSON for this run", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("proposal_lora_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_config_survives_disk() {
        let dir   = scratch_dir("run_config");
        let store = RunStore::new(&dir).unwrap();
        let cfg   = FinetuneConfig { epochs: 2, max_examples: Some(64), ..FinetuneConfig::default() };

        let path = store.save_config(&cfg).unwrap();
        assert!(path.ends_with(CONFIG_FILE));

        let loaded = store.load_config().unwrap();
        assert_eq!(loaded.epochs, 2);
        assert_eq!(loaded.max_examples, Some(64));
        assert_eq!(loaded.lora_targets, vec!["q".to_string(), "v".to_string()]);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_evaluation_is_written_as_json() {
        let dir    = scratch_dir("run_eval");
        let store  = RunStore::new(&dir).unwrap();
        let report = EvaluationReport {
            rouge1: 0.5, rouge2: 0.25, rouge_l: 0.5,
            novelty: 0.1, relevance: 1.0,
            num_predictions: 10, novelty_sample: 10,
        };

        store.save_evaluation(&report).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(EVALUATION_FILE)).unwrap()).unwrap();
        assert_eq!(raw["relevance"], 1.0);
        assert_eq!(store.load_evaluation().unwrap(), report);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let store = RunStore::new(scratch_dir("run_missing")).unwrap();
        let err   = store.load_config().unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE));
    }
}
