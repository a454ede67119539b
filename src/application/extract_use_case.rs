// ============================================================
// Layer 2 - ExtractUseCase
// ============================================================
// Turns a directory of PubMed `*.xml.gz` archives into one
// abstract JSONL file:
//
//   Step 1: List the archives        (file list or directory scan)
//   Step 2: Parse a window of files in parallel (rayon)
//   Step 3: Append their abstracts in input order
//   Step 4: Repeat until every file is done
//
// Only one window of parsed files is held in memory. rayon's
// indexed collect keeps results in the order of the input, so
// the output is the same whatever the thread count.
//
// A file that fails to parse aborts the run, unless
// `skip_bad_files` is set, in which case it is logged and left
// out.
//
// Reference: rayon crate documentation

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::loader::{list_archives, PubmedXmlLoader};
use crate::domain::traits::AbstractSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub input_dir:      PathBuf,
    /// Optional list of archive names inside `input_dir`
    pub file_list:      Option<PathBuf>,
    pub output:         PathBuf,
    pub skip_bad_files: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input_dir:      PathBuf::from("pubmed_files"),
            file_list:      None,
            output:         PathBuf::from("staging/pubmed_abstracts.jsonl"),
            skip_bad_files: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSummary {
    pub files:     usize,
    pub skipped:   usize,
    pub abstracts: usize,
}

pub struct ExtractUseCase<S: AbstractSource = PubmedXmlLoader> {
    config: ExtractConfig,
    source: S,
}

impl ExtractUseCase {
    pub fn new(config: ExtractConfig) -> Self {
        Self::with_source(config, PubmedXmlLoader::new())
    }
}

impl<S: AbstractSource> ExtractUseCase<S> {
    pub fn with_source(config: ExtractConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn execute(&self) -> Result<ExtractSummary> {
        let cfg = &self.config;

        // ── Step 1: Archives ─────────────────────────────────────────────────
        let files = list_archives(&cfg.input_dir, cfg.file_list.as_deref())?;
        tracing::info!("Extracting {} archives from '{}'", files.len(), cfg.input_dir.display());

        if let Some(parent) = cfg.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let mut out = BufWriter::new(
            File::create(&cfg.output)
                .with_context(|| format!("Cannot create '{}'", cfg.output.display()))?,
        );

        let window = rayon::current_num_threads().max(1) * 2;
        let mut summary = ExtractSummary::default();

        // ── Step 2-4: Parse windows in parallel, write in order ──────────────
        for chunk in files.chunks(window) {
            let parsed: Vec<_> = chunk
                .par_iter()
                .map(|path| (path, self.source.load_file(path)))
                .collect();

            for (path, result) in parsed {
                summary.files += 1;
                let abstracts = match result {
                    Ok(abstracts) => abstracts,
                    Err(e) if cfg.skip_bad_files => {
                        tracing::warn!("Skipping '{}': {:#}", path.display(), e);
                        summary.skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for a in &abstracts {
                    serde_json::to_writer(&mut out, a)?;
                    out.write_all(b"\n")?;
                }
                summary.abstracts += abstracts.len();
            }
            tracing::info!("{}/{} archives done", summary.files, files.len());
        }
        out.flush()?;

        tracing::info!(
            "Extracted {} abstracts into '{}' ({} files skipped)",
            summary.abstracts,
            cfg.output.display(),
            summary.skipped,
        );
        Ok(summary)
    }
}
