// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what flows
// through the pipeline:
//
//   Abstract     - one extracted PubMed citation (pmid + text)
//   Record       - one tokenised document, ready for packing
//   PackedBatch  - one fixed-shape unit emitted by the packer
//   PackError    - typed failures of the packing engine
//
// Rules for this layer:
//   - NO burn or tokenizers types
//   - NO file I/O
//   - Only data and the traits other layers implement
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// An extracted abstract, one line of the JSONL staging files
pub mod abstract_record;

// A tokenised record with optional per-token mask bits
pub mod record;

// Fixed-shape packed units and their row views
pub mod batch;

// Packer configuration and record errors
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
