// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from raw PubMed archives to fixed-shape token
// units, one stage per module.
//
// The pipeline flows in this order:
//
//   *.xml.gz archives
//       │
//       ▼
//   PubmedXmlLoader   → abstracts as JSONL
//       │
//       ▼
//   shuffler          → deterministic external shuffle
//       │
//       ▼
//   splitter          → train / test by seeded sampling
//       │
//       ▼
//   TokenizingSource  → one Record of token ids per abstract
//       │
//       ▼
//   WindowPacker      → fixed-shape PackedBatch units
//       │
//       ▼
//   TokenBatcher      → Burn tensors for a training loop
//
// Each stage streams; none needs the whole corpus in memory.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Reads PubMed XML archives and abstract JSONL files
pub mod loader;

/// Seeded bucket-and-merge shuffle of large line files
pub mod shuffler;

/// Streams lines into train and test files
pub mod splitter;

/// Chunked tokenisation of abstracts into Records
pub mod tokenize;

/// The rolling-buffer window packer
pub mod packer;

/// Implements Burn's Batcher trait for packed units
pub mod batcher;
