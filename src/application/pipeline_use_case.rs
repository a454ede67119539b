// ============================================================
// Layer 2 - PipelineUseCase
// ============================================================
// Runs every stage in order, from archives to packed units:
//
//   Step 1: Extract   pubmed_files/*.xml.gz → staging/pubmed_abstracts.jsonl
//   Step 2: Shuffle   → data/shuffled_pubmed_abstracts.jsonl
//   Step 3: Split     → data/train.jsonl, data/test.jsonl
//   Step 4: Pack      → processed_batches/train/, processed_batches/test/
//
// All intermediate paths live under `workdir`. Each stage
// writes a complete file before the next one starts, so a
// failed run can be resumed stage by stage from the CLI.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::application::{
    extract_use_case::{ExtractConfig, ExtractSummary, ExtractUseCase},
    pack_use_case::{PackConfig, PackUseCase},
    shuffle_use_case::{ShuffleJob, ShuffleUseCase},
    split_use_case::{SplitJob, SplitUseCase},
};
use crate::data::{
    packer::RemainderPolicy,
    shuffler::{ShuffleConfig, DEFAULT_BUCKET_BYTES},
    splitter::{SplitConfig, SplitCounts},
    tokenize::DEFAULT_CHUNK_SIZE,
};
use crate::infra::{metrics::RunMetrics, tokenizer_store::Delimiter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input_dir:        PathBuf,
    pub file_list:        Option<PathBuf>,
    pub workdir:          PathBuf,
    pub skip_bad_files:   bool,
    pub seed:             u64,
    pub bucket_bytes:     u64,
    pub test_ratio:       f64,
    pub tokenizer:        PathBuf,
    pub delimiter:        Delimiter,
    pub token_limit:      usize,
    pub batch_size:       usize,
    pub label_shift:      bool,
    pub remainder_policy: RemainderPolicy,
    pub chunk_size:       usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir:        PathBuf::from("pubmed_files"),
            file_list:        None,
            workdir:          PathBuf::from("."),
            skip_bad_files:   false,
            seed:             42,
            bucket_bytes:     DEFAULT_BUCKET_BYTES,
            test_ratio:       0.01,
            tokenizer:        PathBuf::from("tokenizer.json"),
            delimiter:        Delimiter::default(),
            token_limit:      1024,
            batch_size:       1,
            label_shift:      false,
            remainder_policy: RemainderPolicy::Pad,
            chunk_size:       DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub extract: ExtractSummary,
    pub split:   SplitCounts,
    pub train:   RunMetrics,
    pub test:    RunMetrics,
}

pub struct PipelineUseCase {
    config: PipelineConfig,
}

impl PipelineUseCase {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PipelineSummary> {
        let cfg = &self.config;
        let staged = cfg.workdir.join("staging/pubmed_abstracts.jsonl");
        let shuffled = cfg.workdir.join("data/shuffled_pubmed_abstracts.jsonl");
        let train = cfg.workdir.join("data/train.jsonl");
        let test = cfg.workdir.join("data/test.jsonl");
        let batches = cfg.workdir.join("processed_batches");

        // ── Step 1: Extract ──────────────────────────────────────────────────
        tracing::info!("[1/4] extract");
        let extract = ExtractUseCase::new(ExtractConfig {
            input_dir:      cfg.input_dir.clone(),
            file_list:      cfg.file_list.clone(),
            output:         staged.clone(),
            skip_bad_files: cfg.skip_bad_files,
        })
        .execute()?;

        // ── Step 2: Shuffle ──────────────────────────────────────────────────
        tracing::info!("[2/4] shuffle");
        ShuffleUseCase::new(ShuffleJob {
            input:   staged,
            output:  shuffled.clone(),
            shuffle: ShuffleConfig { seed: cfg.seed, bucket_bytes: cfg.bucket_bytes },
        })
        .execute()?;

        // ── Step 3: Split ────────────────────────────────────────────────────
        tracing::info!("[3/4] split");
        let split = SplitUseCase::new(SplitJob {
            input: shuffled,
            train: train.clone(),
            test:  test.clone(),
            split: SplitConfig { test_ratio: cfg.test_ratio, seed: cfg.seed },
        })
        .execute()?;

        // ── Step 4: Pack both sides ──────────────────────────────────────────
        tracing::info!("[4/4] pack");
        let pack = |input: PathBuf, split: &str| {
            PackUseCase::new(PackConfig {
                input,
                output_dir:       batches.clone(),
                split:            split.to_string(),
                tokenizer:        Some(cfg.tokenizer.clone()),
                pretokenized:     false,
                delimiter:        cfg.delimiter.clone(),
                token_limit:      cfg.token_limit,
                batch_size:       cfg.batch_size,
                label_shift:      cfg.label_shift,
                remainder_policy: cfg.remainder_policy,
                chunk_size:       cfg.chunk_size,
            })
            .execute()
        };
        let train = pack(train, "train")?;
        let test = pack(test, "test")?;

        tracing::info!("Pipeline complete: batches under '{}'", batches.display());
        Ok(PipelineSummary { extract, split, train, test })
    }
}
