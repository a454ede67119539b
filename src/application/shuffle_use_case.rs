// ============================================================
// Layer 2 - ShuffleUseCase
// ============================================================
// Shuffles the staged abstract JSONL so that neighbouring
// abstracts no longer come from the same archive. The work
// itself lives in data::shuffler.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::shuffler::{shuffle_file, ShuffleConfig, ShuffleSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffleJob {
    pub input:   PathBuf,
    pub output:  PathBuf,
    pub shuffle: ShuffleConfig,
}

impl Default for ShuffleJob {
    fn default() -> Self {
        Self {
            input:   PathBuf::from("staging/pubmed_abstracts.jsonl"),
            output:  PathBuf::from("data/shuffled_pubmed_abstracts.jsonl"),
            shuffle: ShuffleConfig::default(),
        }
    }
}

pub struct ShuffleUseCase {
    job: ShuffleJob,
}

impl ShuffleUseCase {
    pub fn new(job: ShuffleJob) -> Self {
        Self { job }
    }

    pub fn execute(&self) -> Result<ShuffleSummary> {
        let job = &self.job;
        tracing::info!(
            "Shuffling '{}' (seed {})",
            job.input.display(),
            job.shuffle.seed
        );
        let summary = shuffle_file(&job.input, &job.output, &job.shuffle)?;
        tracing::info!(
            "Shuffled {} lines through {} buckets into '{}'",
            summary.lines,
            summary.buckets,
            job.output.display()
        );
        Ok(summary)
    }
}
