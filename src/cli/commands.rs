// ============================================================
// Layer 1 - CLI Commands and Arguments
// ============================================================
// Defines the subcommands, one per pipeline stage plus `run`
// for the whole chain and `inspect` for checking the output.
//
// Defaults reproduce the usual PubMed layout:
//   pubmed_files/ → staging/ → data/ → processed_batches/
//
// Each Args struct converts into the matching application
// config through `From`; the application layer never sees
// clap types.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    extract_use_case::ExtractConfig,
    inspect_use_case::InspectConfig,
    pack_use_case::PackConfig,
    pipeline_use_case::PipelineConfig,
    shuffle_use_case::ShuffleJob,
    split_use_case::SplitJob,
};
use crate::data::{
    packer::RemainderPolicy,
    shuffler::{ShuffleConfig, DEFAULT_BUCKET_BYTES},
    splitter::SplitConfig,
    tokenize::DEFAULT_CHUNK_SIZE,
};
use crate::infra::tokenizer_store::{Delimiter, DEFAULT_DELIMITER_TOKEN};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract abstracts from PubMed .xml.gz archives into JSONL
    Extract(ExtractArgs),

    /// Deterministically shuffle a JSONL file of any size
    Shuffle(ShuffleArgs),

    /// Split a shuffled JSONL file into train and test
    Split(SplitArgs),

    /// Tokenise one split and pack it into fixed-size batches
    Pack(PackArgs),

    /// Run extract, shuffle, split and pack in one go
    Run(RunArgs),

    /// Load packed batches back as tensors and report on them
    Inspect(InspectArgs),
}

// ─── extract ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Directory holding the PubMed archives
    #[arg(long, default_value = "pubmed_files")]
    pub input_dir: PathBuf,

    /// File listing the archive names to use, one per line
    /// (default: every *.xml.gz in --input-dir)
    #[arg(long)]
    pub file_list: Option<PathBuf>,

    #[arg(long, default_value = "staging/pubmed_abstracts.jsonl")]
    pub output: PathBuf,

    /// Log and skip archives that fail to parse instead of stopping
    #[arg(long)]
    pub skip_bad_files: bool,
}

impl From<ExtractArgs> for ExtractConfig {
    fn from(a: ExtractArgs) -> Self {
        ExtractConfig {
            input_dir:      a.input_dir,
            file_list:      a.file_list,
            output:         a.output,
            skip_bad_files: a.skip_bad_files,
        }
    }
}

// ─── shuffle ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ShuffleArgs {
    #[arg(long, default_value = "staging/pubmed_abstracts.jsonl")]
    pub input: PathBuf,

    #[arg(long, default_value = "data/shuffled_pubmed_abstracts.jsonl")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Upper bound on bytes held in memory at once
    #[arg(long, default_value_t = DEFAULT_BUCKET_BYTES)]
    pub bucket_bytes: u64,
}

impl From<ShuffleArgs> for ShuffleJob {
    fn from(a: ShuffleArgs) -> Self {
        ShuffleJob {
            input:   a.input,
            output:  a.output,
            shuffle: ShuffleConfig { seed: a.seed, bucket_bytes: a.bucket_bytes },
        }
    }
}

// ─── split ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SplitArgs {
    #[arg(long, default_value = "data/shuffled_pubmed_abstracts.jsonl")]
    pub input: PathBuf,

    #[arg(long, default_value = "data/train.jsonl")]
    pub train: PathBuf,

    #[arg(long, default_value = "data/test.jsonl")]
    pub test: PathBuf,

    /// Probability that a line goes to the test set
    #[arg(long, default_value_t = 0.01)]
    pub test_ratio: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<SplitArgs> for SplitJob {
    fn from(a: SplitArgs) -> Self {
        SplitJob {
            input: a.input,
            train: a.train,
            test:  a.test,
            split: SplitConfig { test_ratio: a.test_ratio, seed: a.seed },
        }
    }
}

// ─── packing options shared by pack and run ───────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct PackingArgs {
    /// HuggingFace tokenizer.json (e.g. GPT-2's)
    #[arg(long, default_value = "tokenizer.json")]
    pub tokenizer: PathBuf,

    /// Token appended after every abstract
    #[arg(long, default_value = DEFAULT_DELIMITER_TOKEN)]
    pub delimiter_token: String,

    /// Delimiter as a raw id; overrides --delimiter-token
    #[arg(long)]
    pub delimiter_id: Option<u32>,

    /// Tokens per window
    #[arg(long, default_value_t = 1024)]
    pub token_limit: usize,

    /// Windows per emitted batch
    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    /// Also emit next-token labels (draws one extra token per batch)
    #[arg(long)]
    pub label_shift: bool,

    /// What to do with the final partial batch: pad or drop
    #[arg(long, default_value = "pad")]
    pub remainder: RemainderPolicy,

    /// Abstracts tokenised per call
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

impl PackingArgs {
    pub fn delimiter(&self) -> Delimiter {
        match self.delimiter_id {
            Some(id) => Delimiter::Id(id),
            None => Delimiter::Token(self.delimiter_token.clone()),
        }
    }
}

// ─── pack ─────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PackArgs {
    #[arg(long, default_value = "data/train.jsonl")]
    pub input: PathBuf,

    /// Batches go to <output-dir>/<split>/
    #[arg(long, default_value = "processed_batches")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "train")]
    pub split: String,

    /// Input lines are {"input_ids": [...]} instead of abstracts;
    /// the tokenizer is then only used to look up the delimiter
    #[arg(long)]
    pub pretokenized: bool,

    /// With --pretokenized and --delimiter-id, skip loading a tokenizer
    #[arg(long)]
    pub no_tokenizer: bool,

    #[command(flatten)]
    pub packing: PackingArgs,
}

impl From<PackArgs> for PackConfig {
    fn from(a: PackArgs) -> Self {
        let delimiter = a.packing.delimiter();
        PackConfig {
            input:            a.input,
            output_dir:       a.output_dir,
            split:            a.split,
            tokenizer:        (!a.no_tokenizer).then_some(a.packing.tokenizer),
            pretokenized:     a.pretokenized,
            delimiter,
            token_limit:      a.packing.token_limit,
            batch_size:       a.packing.batch_size,
            label_shift:      a.packing.label_shift,
            remainder_policy: a.packing.remainder,
            chunk_size:       a.packing.chunk_size,
        }
    }
}

// ─── run ──────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, default_value = "pubmed_files")]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub file_list: Option<PathBuf>,

    /// Root for staging/, data/ and processed_batches/
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    #[arg(long)]
    pub skip_bad_files: bool,

    /// Seed for both the shuffle and the split
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = DEFAULT_BUCKET_BYTES)]
    pub bucket_bytes: u64,

    #[arg(long, default_value_t = 0.01)]
    pub test_ratio: f64,

    #[command(flatten)]
    pub packing: PackingArgs,
}

impl From<RunArgs> for PipelineConfig {
    fn from(a: RunArgs) -> Self {
        let delimiter = a.packing.delimiter();
        PipelineConfig {
            input_dir:        a.input_dir,
            file_list:        a.file_list,
            workdir:          a.workdir,
            skip_bad_files:   a.skip_bad_files,
            seed:             a.seed,
            bucket_bytes:     a.bucket_bytes,
            test_ratio:       a.test_ratio,
            tokenizer:        a.packing.tokenizer,
            delimiter,
            token_limit:      a.packing.token_limit,
            batch_size:       a.packing.batch_size,
            label_shift:      a.packing.label_shift,
            remainder_policy: a.packing.remainder,
            chunk_size:       a.packing.chunk_size,
        }
    }
}

// ─── inspect ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// A batch file, or a split directory such as processed_batches/train
    #[arg(long, default_value = "processed_batches/train")]
    pub path: PathBuf,

    /// Decode the first window of each batch with this tokenizer
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,
}

impl From<InspectArgs> for InspectConfig {
    fn from(a: InspectArgs) -> Self {
        InspectConfig { path: a.path, tokenizer: a.tokenizer }
    }
}
