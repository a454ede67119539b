// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Concerns used by the use cases that belong to no single
// pipeline stage:
//
//   tokenizer_store.rs - Loads a HuggingFace tokenizer.json and
//                        resolves the delimiter id.
//
//   batch_store.rs     - One gzip JSON file per packed unit,
//                        plus the run's config and summary.
//
//   metrics.rs         - Appends per-run counters to a CSV.
//
// Reference: Rust Book §7 (Modules)

/// Tokenizer loading and delimiter lookup
pub mod tokenizer_store;

/// Packed unit persistence
pub mod batch_store;

/// Pack statistics CSV logger
pub mod metrics;
