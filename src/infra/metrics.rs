// ============================================================
// Layer 6 - Pack Metrics Logger
// ============================================================
// Appends one row per packing run to a CSV file, so the train
// and test runs of a pipeline (and reruns) can be compared in a
// spreadsheet.
//
// Output file: <output_dir>/pack_stats.csv
//
// Example CSV output:
//   split,records,input_tokens,delimiters,packed_tokens,padding_tokens,dropped_tokens,units,seconds
//   train,1000,182345,1000,183345,0,0,179,4.210000
//   test,10,1790,10,1800,248,0,2,0.051000
//
// How to read the row:
//   packed_tokens + dropped_tokens == input_tokens + delimiters
//   A large padding_tokens on a big split means batch_size is too
//   coarse for the data.
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::packer::PackStats;

const HEADER: &str =
    "split,records,input_tokens,delimiters,packed_tokens,padding_tokens,dropped_tokens,units,seconds";

/// One row of the CSV: a finished packing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Split name, e.g. "train"
    pub split: String,

    #[serde(flatten)]
    pub stats: PackStats,

    /// Wall-clock duration of the run
    pub seconds: f64,
}

impl RunMetrics {
    pub fn new(split: impl Into<String>, stats: PackStats, seconds: f64) -> Self {
        Self { split: split.into(), stats, seconds }
    }

    /// Fraction of emitted cells that are padding; 0 when nothing was emitted
    pub fn padding_ratio(&self) -> f64 {
        let cells = self.stats.packed_tokens + self.stats.padding_tokens;
        if cells == 0 {
            return 0.0;
        }
        self.stats.padding_tokens as f64 / cells as f64
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open `dir/pack_stats.csv`, writing the header if the file is new.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        let csv_path = dir.join("pack_stats.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one run as a new row.
    pub fn log(&self, m: &RunMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let s = &m.stats;
        writeln!(
            f,
            "{},{},{},{},{},{},{},{},{:.6}",
            m.split,
            s.records,
            s.input_tokens,
            s.delimiters,
            s.packed_tokens,
            s.padding_tokens,
            s.dropped_tokens,
            s.units,
            m.seconds,
        )?;

        tracing::debug!(
            "Logged {} metrics: {} units, padding {:.2}%",
            m.split,
            s.units,
            m.padding_ratio() * 100.0,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
