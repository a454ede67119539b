// ============================================================
// Layer 4 - Train/Test Splitter
// ============================================================
// Streams an already-shuffled JSONL file into a train file and
// a test file.
//
// Each line independently goes to the test side with
// probability `test_ratio`, drawn from an RNG seeded with
// `seed`. Nothing is held in memory beyond the current line,
// so the corpus size does not matter. A ratio of 0.01 is
// plenty for a corpus the size of PubMed.
//
// Split ratio: 99% train, 1% test (configurable)
//
// Reference: rand crate documentation

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Probability that a line lands in the test set
    pub test_ratio: f64,
    pub seed:       u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { test_ratio: 0.01, seed: 42 }
    }
}

/// How many lines went to each side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub test:  usize,
}

/// Route every line of `input` to `train` or `test`.
pub fn split_lines<R, T, V>(input: R, train: &mut T, test: &mut V, cfg: &SplitConfig) -> Result<SplitCounts>
where
    R: BufRead,
    T: Write,
    V: Write,
{
    if !(0.0..=1.0).contains(&cfg.test_ratio) {
        bail!("test_ratio must be within [0, 1], got {}", cfg.test_ratio);
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut counts = SplitCounts::default();

    for line in input.lines() {
        let line = line.context("Cannot read input line")?;
        // One draw per line, blank or not, keeps the stream aligned
        if rng.gen::<f64>() < cfg.test_ratio {
            writeln!(test, "{line}")?;
            counts.test += 1;
        } else {
            writeln!(train, "{line}")?;
            counts.train += 1;
        }
    }

    let total = counts.train + counts.test;
    tracing::debug!(
        "Dataset split: {} train, {} test ({}% / {}%)",
        counts.train,
        counts.test,
        (counts.train * 100) / total.max(1),
        (counts.test * 100) / total.max(1),
    );

    Ok(counts)
}

/// File-to-file wrapper around `split_lines`.
pub fn split_file(input: &Path, train: &Path, test: &Path, cfg: &SplitConfig) -> Result<SplitCounts> {
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("Cannot open '{}'", input.display()))?,
    );
    let mut train_out = BufWriter::new(
        File::create(train).with_context(|| format!("Cannot create '{}'", train.display()))?,
    );
    let mut test_out = BufWriter::new(
        File::create(test).with_context(|| format!("Cannot create '{}'", test.display()))?,
    );

    let counts = split_lines(reader, &mut train_out, &mut test_out, cfg)?;
    train_out.flush()?;
    test_out.flush()?;
    Ok(counts)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(n: usize) -> String {
        (0..n).map(|i| format!("line {i}\n")).collect()
    }

    fn run(n: usize, cfg: &SplitConfig) -> (Vec<u8>, Vec<u8>, SplitCounts) {
        let input = corpus(n);
        let (mut train, mut test) = (Vec::new(), Vec::new());
        let counts = split_lines(input.as_bytes(), &mut train, &mut test, cfg).unwrap();
        (train, test, counts)
    }

    #[test]
    fn test_all_lines_preserved() {
        let (train, test, counts) = run(10_000, &SplitConfig::default());
        assert_eq!(counts.train + counts.test, 10_000);
        let joined = String::from_utf8(train).unwrap() + &String::from_utf8(test).unwrap();
        assert_eq!(joined.lines().count(), 10_000);
    }

    #[test]
    fn test_ratio_is_roughly_respected() {
        let cfg = SplitConfig { test_ratio: 0.1, seed: 1 };
        let (_, _, counts) = run(20_000, &cfg);
        assert!((1_700..2_300).contains(&counts.test), "got {}", counts.test);
    }

    #[test]
    fn test_same_seed_same_split() {
        let cfg = SplitConfig { test_ratio: 0.3, seed: 9 };
        let (train_a, test_a, _) = run(1_000, &cfg);
        let (train_b, test_b, _) = run(1_000, &cfg);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
    }

    #[test]
    fn test_zero_ratio_sends_everything_to_train() {
        let cfg = SplitConfig { test_ratio: 0.0, seed: 42 };
        let (_, test, counts) = run(100, &cfg);
        assert_eq!(counts.train, 100);
        assert!(test.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let (train, test, counts) = run(0, &SplitConfig::default());
        assert!(train.is_empty() && test.is_empty());
        assert_eq!(counts, SplitCounts::default());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let cfg = SplitConfig { test_ratio: 1.5, seed: 0 };
        let (mut a, mut b) = (Vec::new(), Vec::new());
        assert!(split_lines("x\n".as_bytes(), &mut a, &mut b, &cfg).is_err());
    }

    #[test]
    fn test_split_file_writes_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("shuffled.jsonl");
        std::fs::write(&input, corpus(500)).unwrap();
        let (train, test) = (dir.path().join("train.jsonl"), dir.path().join("test.jsonl"));

        let cfg = SplitConfig { test_ratio: 0.5, seed: 3 };
        let counts = split_file(&input, &train, &test, &cfg).unwrap();
        let train_lines = std::fs::read_to_string(&train).unwrap().lines().count();
        let test_lines = std::fs::read_to_string(&test).unwrap().lines().count();
        assert_eq!((train_lines, test_lines), (counts.train, counts.test));
    }
}
