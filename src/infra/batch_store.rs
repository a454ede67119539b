// ============================================================
// Layer 6 - Batch Store
// ============================================================
// Persists packed units, one gzip-compressed JSON file each.
//
// Layout of one split directory:
//   processed_batches/train/
//     batch_0000.json.gz   ← unit 0
//     batch_0001.json.gz   ← unit 1
//     ...
//     pack_config.json     ← effective packer + tokenizer settings
//     pack_summary.json    ← counters for the whole run
//
// Each batch file holds:
//   { "shape": [rows, cols],
//     "input_ids": [[...], ...],
//     "attention_mask": [[...], ...],
//     "labels": [[...], ...] }        ← only under label shift
//
// Files are opened with create_new, so an existing unit is never
// overwritten; a directory that already holds batches is refused
// up front. Numbering starts at 0 and has no gaps.
//
// Reference: Rust Book §9 (Error Handling)
//            flate2 crate documentation

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::batch::PackedBatch;
use crate::domain::record::TokenId;
use crate::domain::traits::BatchSink;

pub const CONFIG_FILE: &str = "pack_config.json";
pub const SUMMARY_FILE: &str = "pack_summary.json";

/// On-disk shape of one unit: rows nested for readability.
#[derive(Debug, Serialize, Deserialize)]
struct BatchFile {
    shape:          [usize; 2],
    input_ids:      Vec<Vec<TokenId>>,
    attention_mask: Vec<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels:         Option<Vec<Vec<TokenId>>>,
}

impl From<&PackedBatch> for BatchFile {
    fn from(batch: &PackedBatch) -> Self {
        let (rows, cols) = batch.shape();
        let has_labels = batch.labels().is_some();
        let mut file = BatchFile {
            shape:          [rows, cols],
            input_ids:      Vec::with_capacity(rows),
            attention_mask: Vec::with_capacity(rows),
            labels:         has_labels.then(|| Vec::with_capacity(rows)),
        };
        for window in batch.windows() {
            file.input_ids.push(window.input_ids.to_vec());
            file.attention_mask.push(window.attention_mask.to_vec());
            if let (Some(out), Some(labels)) = (file.labels.as_mut(), window.labels) {
                out.push(labels.to_vec());
            }
        }
        file
    }
}

impl BatchFile {
    fn into_batch(self) -> Result<PackedBatch> {
        let [rows, cols] = self.shape;
        let flatten = |name: &str, nested: Vec<Vec<TokenId>>| -> Result<Vec<TokenId>> {
            if nested.len() != rows || nested.iter().any(|r| r.len() != cols) {
                bail!("'{name}' does not match shape [{rows}, {cols}]");
            }
            Ok(nested.concat())
        };

        let input_ids = flatten("input_ids", self.input_ids)?;
        if self.attention_mask.len() != rows
            || self.attention_mask.iter().any(|r| r.len() != cols)
        {
            bail!("'attention_mask' does not match shape [{rows}, {cols}]");
        }
        let attention_mask = self.attention_mask.concat();
        let labels = self.labels.map(|l| flatten("labels", l)).transpose()?;

        let batch = PackedBatch::new(rows, cols, input_ids, attention_mask, labels);
        if !batch.is_well_formed() {
            bail!("attention_mask holds values other than 0 and 1");
        }
        Ok(batch)
    }
}

/// Path of unit `index` inside `dir`.
pub fn batch_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("batch_{index:04}.json.gz"))
}

/// Numbered unit files in `dir`, sorted by name.
pub fn list_batches(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Cannot read batch directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("batch_") && n.ends_with(".json.gz"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Writes one file per unit into a single directory.
pub struct BatchStore {
    dir:     PathBuf,
    written: usize,
}

impl BatchStore {
    /// Open `dir` for a fresh run, creating it if needed.
    /// Fails if the directory already holds batch files.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
        let existing = list_batches(&dir)?;
        if !existing.is_empty() {
            bail!(
                "'{}' already holds {} batch files; refusing to overwrite",
                dir.display(),
                existing.len()
            );
        }
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save the effective configuration of this run.
    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        self.save_json(CONFIG_FILE, cfg)
    }

    /// Save the final counters of this run.
    pub fn save_summary<T: Serialize>(&self, summary: &T) -> Result<()> {
        self.save_json(SUMMARY_FILE, summary)
    }

    fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }
}

impl BatchSink for BatchStore {
    fn write(&mut self, batch: &PackedBatch) -> Result<usize> {
        let index = self.written;
        let path = batch_path(&self.dir, index);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("Cannot create batch file '{}'", path.display()))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, &BatchFile::from(batch))
            .with_context(|| format!("Cannot serialise batch {index}"))?;
        encoder.finish()?.flush()?;

        self.written += 1;
        tracing::debug!("Wrote batch {} to '{}'", index, path.display());
        Ok(index)
    }
}

/// Read a unit back from disk and validate its shape.
pub fn load_batch(path: &Path) -> Result<PackedBatch> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open batch file '{}'", path.display()))?;
    let parsed: BatchFile = serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
        .with_context(|| format!("Cannot parse batch file '{}'", path.display()))?;
    parsed
        .into_batch()
        .with_context(|| format!("Malformed batch file '{}'", path.display()))
}

/// Read a JSON sidecar such as pack_config.json.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn unit(seed: u32, labels: bool) -> PackedBatch {
        let ids: Vec<u32> = (seed..seed + 6).collect();
        let labels = labels.then(|| (seed + 1..seed + 7).collect());
        PackedBatch::new(2, 3, ids, vec![1, 1, 1, 1, 0, 0], labels)
    }

    #[test]
    fn test_write_and_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BatchStore::create(dir.path().join("train")).unwrap();

        let a = unit(10, true);
        let b = unit(20, false);
        assert_eq!(store.write(&a).unwrap(), 0);
        assert_eq!(store.write(&b).unwrap(), 1);
        assert_eq!(list_batches(store.dir()).unwrap().len(), 2);

        assert_eq!(load_batch(&batch_path(store.dir(), 0)).unwrap(), a);
        assert_eq!(load_batch(&batch_path(store.dir(), 1)).unwrap(), b);
    }

    #[test]
    fn test_numbering_is_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BatchStore::create(dir.path()).unwrap();
        for i in 0..12 {
            store.write(&unit(i, false)).unwrap();
        }
        store.save_summary(&serde_json::json!({"units": 12})).unwrap();

        let names: Vec<String> = list_batches(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let expected: Vec<String> = (0..12).map(|i| format!("batch_{i:04}.json.gz")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_refuses_directory_with_batches() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BatchStore::create(dir.path()).unwrap();
        store.write(&unit(0, false)).unwrap();

        let err = BatchStore::create(dir.path()).err().unwrap();
        assert!(err.to_string().contains("refusing to overwrite"));
    }

    #[test]
    fn test_never_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BatchStore::create(dir.path()).unwrap();
        fs::write(batch_path(dir.path(), 0), b"precious").unwrap();

        assert!(store.write(&unit(0, false)).is_err());
        assert_eq!(fs::read(batch_path(dir.path(), 0)).unwrap(), b"precious");
    }

    #[test]
    fn test_file_layout_is_nested_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BatchStore::create(dir.path()).unwrap();
        store.write(&unit(1, false)).unwrap();

        let file = File::open(batch_path(dir.path(), 0)).unwrap();
        let value: serde_json::Value = serde_json::from_reader(GzDecoder::new(file)).unwrap();
        assert_eq!(value["shape"], serde_json::json!([2, 3]));
        assert_eq!(value["input_ids"], serde_json::json!([[1, 2, 3], [4, 5, 6]]));
        assert!(value.get("labels").is_none());
    }

    #[test]
    fn test_load_rejects_bad_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_0000.json.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(br#"{"shape":[2,2],"input_ids":[[1,2]],"attention_mask":[[1,1]]}"#)
            .unwrap();
        enc.finish().unwrap();

        assert!(load_batch(&path).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::create(dir.path()).unwrap();
        store.save_config(&serde_json::json!({"token_limit": 1024})).unwrap();

        let back: serde_json::Value = load_json(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(back["token_limit"], 1024);
    }
}
