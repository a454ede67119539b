// ============================================================
// Layer 4 - Deterministic External Shuffle
// ============================================================
// Shuffles a line-oriented file that may be far larger than
// memory, reproducibly for a given seed.
//
// Seeded bucket-and-merge:
//   1. Scatter: every line goes to one of N temp bucket files,
//      picked by a seeded RNG. N = ceil(file size / bucket size)
//   2. Merge: each bucket is loaded on its own, shuffled with
//      the same RNG stream (Fisher-Yates) and appended to the
//      output in bucket order.
//
// Every permutation stays reachable and memory is bounded by
// roughly one bucket. The same input, seed and bucket size
// always give the same output.
//
// Reference: rand crate documentation (SeedableRng, SliceRandom)

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default upper bound on the bytes held in memory per bucket
pub const DEFAULT_BUCKET_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleConfig {
    pub seed:         u64,
    pub bucket_bytes: u64,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self { seed: 42, bucket_bytes: DEFAULT_BUCKET_BYTES }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleSummary {
    pub lines:   usize,
    pub buckets: usize,
}

/// Shuffle the lines of `input` into `output`.
pub fn shuffle_file(input: &Path, output: &Path, cfg: &ShuffleConfig) -> Result<ShuffleSummary> {
    let size = fs::metadata(input)
        .with_context(|| format!("Cannot stat '{}'", input.display()))?
        .len();
    let bucket_bytes = cfg.bucket_bytes.max(1);
    let buckets = usize::try_from(size.div_ceil(bucket_bytes).max(1))
        .context("Too many shuffle buckets")?;

    // Buckets live next to the output so they land on the same disk
    let parent = output.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    let scratch = tempfile::Builder::new()
        .prefix(".shuffle-")
        .tempdir_in(parent)
        .context("Cannot create shuffle scratch directory")?;

    let mut rng = StdRng::seed_from_u64(cfg.seed);

    // ── Step 1: Scatter lines into buckets ───────────────────────────────────
    let bucket_paths: Vec<_> = (0..buckets)
        .map(|i| scratch.path().join(format!("bucket_{i:05}")))
        .collect();
    let mut writers = bucket_paths
        .iter()
        .map(|p| File::create(p).map(BufWriter::new))
        .collect::<std::io::Result<Vec<_>>>()
        .context("Cannot create shuffle buckets")?;

    let mut reader = BufReader::new(
        File::open(input).with_context(|| format!("Cannot open '{}'", input.display()))?,
    );
    let mut line = Vec::new();
    let mut lines = 0usize;
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("Cannot read '{}'", input.display()))?;
        if read == 0 {
            break;
        }
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        let bucket = rng.gen_range(0..buckets);
        writers[bucket].write_all(&line)?;
        lines += 1;
    }
    for mut w in writers {
        w.flush()?;
    }
    tracing::debug!("Scattered {} lines into {} buckets", lines, buckets);

    // ── Step 2: Shuffle each bucket and append ───────────────────────────────
    let mut out = BufWriter::new(
        File::create(output).with_context(|| format!("Cannot create '{}'", output.display()))?,
    );
    for path in &bucket_paths {
        let contents = fs::read(path)
            .with_context(|| format!("Cannot read bucket '{}'", path.display()))?;
        let mut rows: Vec<&[u8]> = contents
            .split_inclusive(|&b| b == b'\n')
            .collect();
        rows.shuffle(&mut rng);
        for row in rows {
            out.write_all(row)?;
        }
    }
    out.flush()?;

    Ok(ShuffleSummary { lines, buckets })
}
