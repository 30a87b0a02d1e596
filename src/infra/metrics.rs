// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:     the epoch number (1, 2, 3, ...)
//   - mean_loss: average masked cross-entropy over the batches
//                that produced a loss
//   - batches:   batches that contributed to mean_loss
//   - skipped:   batches skipped because every label was padding
//
// Output file: <metrics_dir>/metrics.csv
//
// Example CSV output:
//   epoch,mean_loss,batches,skipped
//   1,3.124500,42,0
//   2,2.890100,42,0
//   ...

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Average loss over the batches that were trained on.
    /// NaN when every batch of the epoch was skipped.
    pub mean_loss: f64,

    pub batches: usize,

    pub skipped: usize,
}

impl EpochMetrics {
    pub fn new(epoch: usize, loss_sum: f64, batches: usize, skipped: usize) -> Self {
        let mean_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
        Self { epoch, mean_loss, batches, skipped }
    }

    /// Returns true if this epoch beat the previous best loss
    pub fn is_improvement(&self, best_loss: f64) -> bool {
        self.mean_loss < best_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the directory if needed and write the CSV header if the
    /// file doesn't exist yet, so runs append to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("creating metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("creating '{}'", csv_path.display()))?;
            writeln!(f, "epoch,mean_loss,batches,skipped")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("opening '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{},{}", m.epoch, m.mean_loss, m.batches, m.skipped)?;

        tracing::debug!("Logged epoch {} metrics: mean_loss={:.4}", m.epoch, m.mean_loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
