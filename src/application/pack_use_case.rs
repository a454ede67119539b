// ============================================================
// Layer 2 - PackUseCase
// ============================================================
// Packs one split (e.g. data/train.jsonl) into numbered units:
//
//   Step 1: Resolve the delimiter    (Layer 6 - infra)
//   Step 2: Open the record stream   (Layer 4 - data)
//   Step 3: Open the batch store     (Layer 6 - infra)
//   Step 4: Save the effective config
//   Step 5: Push records, write every ready unit
//   Step 6: Apply the remainder policy at end of input
//   Step 7: Save summary, append metrics row
//
// Records come either from abstract JSONL run through the
// tokenizer, or from pre-tokenised JSONL. The packer only ever
// sees `Record`s, so the rest of the run is the same.
//
// Reference: Rust Book §13 (Iterators and Closures)

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::JsonlAbstracts,
    packer::{PackStats, PackerConfig, RemainderPolicy, WindowPacker},
    tokenize::{PretokenizedRecords, TokenizingSource, DEFAULT_CHUNK_SIZE},
};
use crate::domain::record::Record;
use crate::domain::traits::BatchSink;
use crate::infra::{
    batch_store::BatchStore,
    metrics::{MetricsLogger, RunMetrics},
    tokenizer_store::{resolve_delimiter, Delimiter, TokenizerStore},
};

// ─── Pack Configuration ───────────────────────────────────────────────────────
// Saved as pack_config.json next to the batches it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackConfig {
    /// JSONL input: abstracts, or token ids when `pretokenized`
    pub input:            PathBuf,
    /// Units go to `<output_dir>/<split>/`
    pub output_dir:       PathBuf,
    pub split:            String,
    /// Required unless `pretokenized` with a numeric delimiter
    pub tokenizer:        Option<PathBuf>,
    pub pretokenized:     bool,
    pub delimiter:        Delimiter,
    pub token_limit:      usize,
    pub batch_size:       usize,
    pub label_shift:      bool,
    pub remainder_policy: RemainderPolicy,
    /// Abstracts per `encode_batch` call
    pub chunk_size:       usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            input:            PathBuf::from("data/train.jsonl"),
            output_dir:       PathBuf::from("processed_batches"),
            split:            "train".to_string(),
            tokenizer:        Some(PathBuf::from("tokenizer.json")),
            pretokenized:     false,
            delimiter:        Delimiter::default(),
            token_limit:      1024,
            batch_size:       1,
            label_shift:      false,
            remainder_policy: RemainderPolicy::Pad,
            chunk_size:       DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What pack_config.json records: the run inputs plus the
/// packer settings with the delimiter resolved to an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPackConfig {
    pub run:    PackConfig,
    pub packer: PackerConfig,
}

// ─── Core loop ────────────────────────────────────────────────────────────────

/// Drive `packer` over `records`, writing units to `sink` as soon
/// as they are ready. The remainder is handled once, after the
/// last record. Any upstream error stops the run.
pub fn pack_into<I, S>(packer: WindowPacker, records: I, sink: &mut S) -> Result<PackStats>
where
    I: IntoIterator<Item = Result<Record>>,
    S: BatchSink,
{
    let mut stream = packer.try_pack(records);
    for unit in stream.by_ref() {
        sink.write(&unit?)?;
    }
    Ok(stream.stats())
}

// ─── PackUseCase ──────────────────────────────────────────────────────────────
pub struct PackUseCase {
    config: PackConfig,
}

impl PackUseCase {
    pub fn new(config: PackConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<RunMetrics> {
        let cfg = &self.config;
        let started = Instant::now();

        // ── Step 1: Tokenizer and delimiter ──────────────────────────────────
        let tokenizer = match (&cfg.tokenizer, cfg.pretokenized) {
            (Some(path), _) => Some(TokenizerStore::new(path).load()?),
            (None, true) => None,
            (None, false) => bail!("A tokenizer is required unless the input is pre-tokenised"),
        };
        let delimiter_id = match (&tokenizer, &cfg.delimiter) {
            (Some(tok), delimiter) => resolve_delimiter(tok, delimiter)?,
            (None, Delimiter::Id(id)) => *id,
            (None, Delimiter::Token(token)) => {
                bail!("Delimiter token '{token}' needs a tokenizer; pass a numeric id instead")
            }
        };

        let packer_cfg = PackerConfig::new(cfg.token_limit, cfg.batch_size, delimiter_id)
            .with_label_shift(cfg.label_shift)
            .with_remainder_policy(cfg.remainder_policy);
        let packer = WindowPacker::new(packer_cfg)?;
        tracing::info!(
            "Packing '{}' into units of {} x {} (delimiter {}, {} remainder)",
            cfg.input.display(),
            cfg.batch_size,
            cfg.token_limit,
            delimiter_id,
            cfg.remainder_policy,
        );

        // ── Step 2: Record stream ────────────────────────────────────────────
        let records: Box<dyn Iterator<Item = Result<Record>> + '_> = match &tokenizer {
            Some(tok) if !cfg.pretokenized => Box::new(TokenizingSource::new(
                tok,
                JsonlAbstracts::open(&cfg.input)?,
                cfg.chunk_size,
            )),
            _ => Box::new(PretokenizedRecords::open(&cfg.input)?),
        };

        // ── Step 3-4: Store and config ───────────────────────────────────────
        let mut store = BatchStore::create(cfg.output_dir.join(&cfg.split))?;
        store.save_config(&SavedPackConfig { run: cfg.clone(), packer: packer_cfg })?;

        // ── Step 5-6: Pack ───────────────────────────────────────────────────
        let stats = pack_into(packer, records, &mut store)?;

        // ── Step 7: Summary and metrics ──────────────────────────────────────
        let metrics = RunMetrics::new(&cfg.split, stats, started.elapsed().as_secs_f64());
        store.save_summary(&metrics)?;
        MetricsLogger::new(&cfg.output_dir)?.log(&metrics)?;

        tracing::info!(
            "{}: {} records → {} units in '{}' ({} padding, {} dropped tokens)",
            cfg.split,
            stats.records,
            stats.units,
            store.dir().display(),
            stats.padding_tokens,
            stats.dropped_tokens,
        );
        Ok(metrics)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::PackedBatch;
    use crate::infra::batch_store::{list_batches, load_batch, load_json, CONFIG_FILE, SUMMARY_FILE};
    use crate::infra::tokenizer_store::test_support::write_word_level;
    use anyhow::anyhow;
    use std::fs;

    fn ok(records: Vec<Vec<u32>>) -> Vec<Result<Record>> {
        records.into_iter().map(|r| Ok(Record::from(r))).collect()
    }

    #[test]
    fn test_pack_into_pads_remainder_once() {
        let packer = WindowPacker::new(PackerConfig::new(4, 1, 99)).unwrap();
        let mut sink: Vec<PackedBatch> = Vec::new();
        let stats = pack_into(packer, ok(vec![vec![1, 2, 3], vec![4, 5], vec![6]]), &mut sink).unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(sink[0].input_ids(), &[1, 2, 3, 99]);
        assert_eq!(sink[1].input_ids(), &[4, 5, 99, 6]);
        assert_eq!(sink[2].input_ids(), &[99, 99, 99, 99]);
        assert_eq!(sink[2].attention_mask(), &[1, 0, 0, 0]);
        assert_eq!(stats.units, 3);
    }

    #[test]
    fn test_pack_into_drop_policy() {
        let cfg = PackerConfig::new(4, 1, 99).with_remainder_policy(RemainderPolicy::Drop);
        let mut sink: Vec<PackedBatch> = Vec::new();
        let stats = pack_into(WindowPacker::new(cfg).unwrap(), ok(vec![vec![1, 2, 3], vec![4, 5], vec![6]]), &mut sink)
            .unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(stats.dropped_tokens, 1);
    }

    #[test]
    fn test_pack_into_stops_on_upstream_error() {
        let packer = WindowPacker::new(PackerConfig::new(2, 1, 0)).unwrap();
        let records = vec![Ok(Record::from(vec![1, 2, 3])), Err(anyhow!("truncated file")), Ok(Record::from(vec![4]))];
        let mut sink: Vec<PackedBatch> = Vec::new();

        let err = pack_into(packer, records, &mut sink).unwrap_err();
        assert!(err.to_string().contains("truncated file"));
        // Units completed before the error were still written; no remainder
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_pack_into_matches_lazy_pack() {
        let records = vec![vec![1, 2, 3, 4, 5], vec![], vec![6, 7], vec![8, 9, 10, 11, 12, 13, 14]];
        let cfg = PackerConfig::new(3, 2, 50).with_label_shift(true);

        let lazy: Vec<PackedBatch> = crate::data::packer::pack(cfg, records.clone())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        let mut sink: Vec<PackedBatch> = Vec::new();
        let stats = pack_into(WindowPacker::new(cfg).unwrap(), ok(records), &mut sink).unwrap();

        assert_eq!(sink, lazy);
        assert_eq!(stats.units, lazy.len());
        assert_eq!(stats.padding_tokens, lazy.iter().map(PackedBatch::padding_tokens).sum::<usize>());
    }

    fn write_jsonl(path: &std::path::Path, lines: &[&str]) {
        fs::write(path, lines.join("\n")).unwrap();
    }

    #[test]
    fn test_execute_tokenizes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("train.jsonl");
        write_jsonl(&input, &[
            r#"{"pmid":"1","abstract":"cells divide fast ."}"#,
            r#"{"pmid":"2","abstract":"tissue grow ."}"#,
            r#"{"pmid":"3","abstract":"cells grow"}"#,
        ]);
        let out = dir.path().join("processed_batches");

        let cfg = PackConfig {
            input: input.clone(),
            output_dir: out.clone(),
            split: "train".into(),
            tokenizer: Some(write_word_level(dir.path())),
            token_limit: 4,
            batch_size: 2,
            label_shift: true,
            chunk_size: 2,
            ..PackConfig::default()
        };
        let metrics = PackUseCase::new(cfg).execute().unwrap();

        // 4 + 1, 3 + 1, 2 + 1 = 12 tokens; 9 per shifted unit → 1 full + 1 padded
        assert_eq!(metrics.stats.records, 3);
        assert_eq!(metrics.stats.units, 2);

        let split_dir = out.join("train");
        let files = list_batches(&split_dir).unwrap();
        assert_eq!(files.len(), 2);
        let first = load_batch(&files[0]).unwrap();
        assert_eq!(first.shape(), (2, 4));
        // cells divide fast . <eot> tissue grow . | <eot>
        assert_eq!(first.input_ids(), &[2, 3, 6, 7, 1, 4, 5, 7]);
        assert_eq!(first.labels().unwrap(), &[3, 6, 7, 1, 4, 5, 7, 1]);

        let saved: SavedPackConfig = load_json(&split_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(saved.packer.delimiter_id, Some(1));
        let summary: RunMetrics = load_json(&split_dir.join(SUMMARY_FILE)).unwrap();
        assert_eq!(summary.stats, metrics.stats);
        assert!(out.join("pack_stats.csv").exists());
    }

    #[test]
    fn test_execute_pretokenized_with_numeric_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ids.jsonl");
        write_jsonl(&input, &[r#"{"input_ids":[5,6,7]}"#, r#"{"input_ids":[8]}"#]);

        let cfg = PackConfig {
            input,
            output_dir: dir.path().join("out"),
            split: "test".into(),
            tokenizer: None,
            pretokenized: true,
            delimiter: Delimiter::Id(0),
            token_limit: 3,
            ..PackConfig::default()
        };
        let metrics = PackUseCase::new(cfg).execute().unwrap();
        assert_eq!(metrics.stats.units, 2);
        assert_eq!(metrics.stats.padding_tokens, 0);
    }

    #[test]
    fn test_execute_reports_invalid_record() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ids.jsonl");
        write_jsonl(&input, &[r#"{"input_ids":[5]}"#, r#"{"input_ids":[-1]}"#]);

        let cfg = PackConfig {
            input,
            output_dir: dir.path().join("out"),
            tokenizer: None,
            pretokenized: true,
            delimiter: Delimiter::Id(0),
            ..PackConfig::default()
        };
        let err = PackUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("ids.jsonl:2"));
    }

    #[test]
    fn test_token_delimiter_without_tokenizer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PackConfig {
            input: dir.path().join("missing.jsonl"),
            output_dir: dir.path().join("out"),
            tokenizer: None,
            pretokenized: true,
            ..PackConfig::default()
        };
        assert!(PackUseCase::new(cfg).execute().is_err());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_rerun_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ids.jsonl");
        write_jsonl(&input, &[r#"{"input_ids":[5,6,7,8]}"#]);
        let cfg = PackConfig {
            input,
            output_dir: dir.path().join("out"),
            tokenizer: None,
            pretokenized: true,
            delimiter: Delimiter::Id(0),
            token_limit: 2,
            ..PackConfig::default()
        };
        PackUseCase::new(cfg.clone()).execute().unwrap();
        assert!(PackUseCase::new(cfg).execute().is_err());
    }
}
