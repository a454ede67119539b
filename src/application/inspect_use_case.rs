// ============================================================
// Layer 2 - InspectUseCase
// ============================================================
// Loads persisted units back the way a training loop would:
// read the file, check its shape, and build Burn tensors.
//
// Accepts a single batch file or a split directory, in which
// case every batch_*.json.gz in it is checked. With a tokenizer
// the first window of each unit is decoded for a quick look.
//
// Reference: Burn Book §4 (Batcher)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use burn::backend::NdArray;
use burn::prelude::*;
use tokenizers::Tokenizer;

use crate::data::batcher::TokenBatcher;
use crate::infra::batch_store::{list_batches, load_batch};
use crate::infra::tokenizer_store::TokenizerStore;

/// CPU backend used for inspection
type InspectBackend = NdArray;

#[derive(Debug, Clone)]
pub struct InspectConfig {
    /// A batch file or a directory of them
    pub path:      PathBuf,
    pub tokenizer: Option<PathBuf>,
}

/// What one unit looked like once turned into tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub path:           PathBuf,
    /// `[batch_size, token_limit]`
    pub dims:           [usize; 2],
    pub real_tokens:    i64,
    pub padding_tokens: i64,
    pub has_labels:     bool,
    pub preview:        Option<String>,
}

pub struct InspectUseCase {
    config: InspectConfig,
}

impl InspectUseCase {
    pub fn new(config: InspectConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<UnitReport>> {
        let cfg = &self.config;
        let files = if cfg.path.is_dir() {
            list_batches(&cfg.path)?
        } else {
            vec![cfg.path.clone()]
        };
        if files.is_empty() {
            bail!("No batch files in '{}'", cfg.path.display());
        }

        let tokenizer = cfg
            .tokenizer
            .as_ref()
            .map(|p| TokenizerStore::new(p).load())
            .transpose()?;

        let device = Default::default();
        let batcher = TokenBatcher::new();
        let mut reports = Vec::with_capacity(files.len());
        let mut width = None;

        for path in &files {
            let report = inspect_one::<InspectBackend>(path, &batcher, &device, tokenizer.as_ref())?;
            // Every unit of a run shares one shape
            match width {
                None => width = Some(report.dims),
                Some(dims) if dims != report.dims => bail!(
                    "'{}' has shape {:?}, expected {:?}",
                    path.display(),
                    report.dims,
                    dims
                ),
                Some(_) => {}
            }
            tracing::debug!("Checked '{}': {:?}", path.display(), report.dims);
            reports.push(report);
        }

        tracing::info!("{} units checked in '{}'", reports.len(), cfg.path.display());
        Ok(reports)
    }
}

fn inspect_one<B: Backend>(
    path: &Path,
    batcher: &TokenBatcher,
    device: &B::Device,
    tokenizer: Option<&Tokenizer>,
) -> Result<UnitReport> {
    let unit = load_batch(path)?;
    let tensors = batcher.tensors::<B>(&unit, device);

    let dims = tensors.input_ids.dims();
    let cells = (dims[0] * dims[1]) as i64;
    let real_tokens: i64 = tensors.attention_mask.into_data().iter::<i64>().sum();

    let preview = match tokenizer {
        Some(tok) => Some(
            tok.decode(unit.window(0).input_ids, false)
                .map_err(|e| anyhow!("Cannot decode '{}': {e}", path.display()))?,
        ),
        None => None,
    };

    Ok(UnitReport {
        path: path.to_path_buf(),
        dims,
        real_tokens,
        padding_tokens: cells - real_tokens,
        has_labels: tensors.labels.is_some(),
        preview,
    })
}
