// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records the per-epoch losses to a CSV file.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: average masked cross-entropy on the train split
//   - val_loss:   average masked cross-entropy on the validation split
//
// Output file: <output_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_loss
//   1,2.184500,1.089200
//   2,0.890100,0.654300
//   ...
//
// The file is recreated at the start of every run so it only
// ever describes one fine-tuning run.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::trainer::EpochLosses;

pub const METRICS_FILE: &str = "metrics.csv";

/// Appends one CSV row per epoch.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the output directory and a fresh CSV with its header
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;

        let csv_path = dir.join(METRICS_FILE);
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "epoch,train_loss,val_loss")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochLosses) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.val_loss)?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn log_all<'a>(&self, epochs: impl IntoIterator<Item = &'a EpochLosses>) -> Result<()> {
        epochs.into_iter().try_for_each(|m| self.log(m))
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
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
    fn test_writes_header_and_rows() {
        let dir    = scratch_dir("metrics_rows");
        let logger = MetricsLogger::new(&dir).unwrap();
        logger.log_all(&[
            EpochLosses { epoch: 1, train_loss: 2.5, val_loss: 2.25 },
            EpochLosses { epoch: 2, train_loss: 1.0, val_loss: 1.5 },
        ]).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(
            csv,
            "epoch,train_loss,val_loss\n1,2.500000,2.250000\n2,1.000000,1.500000\n",
        );
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_new_run_starts_a_fresh_file() {
        let dir = scratch_dir("metrics_fresh");
        MetricsLogger::new(&dir).unwrap()
            .log(&EpochLosses { epoch: 1, train_loss: 1.0, val_loss: 1.0 })
            .unwrap();

        let logger = MetricsLogger::new(&dir).unwrap();
        let csv    = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 1);
        fs::remove_dir_all(dir).ok();
    }
}
