// ============================================================
// Layer 2 - SplitUseCase
// ============================================================
// Splits the shuffled JSONL into train and test files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::splitter::{split_file, SplitConfig, SplitCounts};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitJob {
    pub input: PathBuf,
    pub train: PathBuf,
    pub test:  PathBuf,
    pub split: SplitConfig,
}

impl Default for SplitJob {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/shuffled_pubmed_abstracts.jsonl"),
            train: PathBuf::from("data/train.jsonl"),
            test:  PathBuf::from("data/test.jsonl"),
            split: SplitConfig::default(),
        }
    }
}

pub struct SplitUseCase {
    job: SplitJob,
}

impl SplitUseCase {
    pub fn new(job: SplitJob) -> Self {
        Self { job }
    }

    pub fn execute(&self) -> Result<SplitCounts> {
        let job = &self.job;
        ensure_parent(&job.train)?;
        ensure_parent(&job.test)?;

        let counts = split_file(&job.input, &job.train, &job.test, &job.split)?;
        tracing::info!(
            "Split '{}': {} train, {} test (ratio {})",
            job.input.display(),
            counts.train,
            counts.test,
            job.split.test_ratio
        );
        Ok(counts)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    Ok(())
}
