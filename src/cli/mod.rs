// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands each subcommand
// to its use case in Layer 2. Only this layer prints.
//
//   extract  → ExtractUseCase
//   shuffle  → ShuffleUseCase
//   split    → SplitUseCase
//   pack     → PackUseCase
//   run      → PipelineUseCase
//   inspect  → InspectUseCase
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::Commands;

use crate::application::{
    extract_use_case::ExtractUseCase,
    inspect_use_case::InspectUseCase,
    pack_use_case::PackUseCase,
    pipeline_use_case::PipelineUseCase,
    shuffle_use_case::ShuffleUseCase,
    split_use_case::SplitUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "pubmed-pack",
    version,
    about = "Turn PubMed archives into fixed-size token batches for language-model pretraining."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Extract(args) => {
                let s = ExtractUseCase::new(args.into()).execute()?;
                println!("Extracted {} abstracts from {} files ({} skipped).", s.abstracts, s.files, s.skipped);
            }
            Commands::Shuffle(args) => {
                let s = ShuffleUseCase::new(args.into()).execute()?;
                println!("Shuffled {} lines.", s.lines);
            }
            Commands::Split(args) => {
                let c = SplitUseCase::new(args.into()).execute()?;
                println!("Split into {} train / {} test lines.", c.train, c.test);
            }
            Commands::Pack(args) => {
                let m = PackUseCase::new(args.into()).execute()?;
                println!(
                    "Packed {} records into {} batches ({} padding, {} dropped tokens).",
                    m.stats.records, m.stats.units, m.stats.padding_tokens, m.stats.dropped_tokens
                );
            }
            Commands::Run(args) => {
                let s = PipelineUseCase::new(args.into()).execute()?;
                println!(
                    "Done. {} abstracts → {} train / {} test batches.",
                    s.extract.abstracts, s.train.stats.units, s.test.stats.units
                );
            }
            Commands::Inspect(args) => {
                let reports = InspectUseCase::new(args.into()).execute()?;
                for r in &reports {
                    println!(
                        "{}: {:?}, {} real / {} padding tokens{}",
                        r.path.display(),
                        r.dims,
                        r.real_tokens,
                        r.padding_tokens,
                        if r.has_labels { ", labels" } else { "" }
                    );
                    if let Some(text) = &r.preview {
                        println!("    {text}");
                    }
                }
            }
        }
        Ok(())
    }
}
