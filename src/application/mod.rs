// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// One use case per pipeline stage, plus one that runs them all.
// Each owns its config struct, calls into the data and infra
// layers, and returns a summary for the CLI to print.
//
// Rules for this layer:
//   - No parsing or packing logic here (that's Layer 4)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// PubMed archives → abstract JSONL
pub mod extract_use_case;

// Deterministic shuffle of the staged JSONL
pub mod shuffle_use_case;

// Train / test split
pub mod split_use_case;

// Tokenise and pack one split into numbered units
pub mod pack_use_case;

// extract → shuffle → split → pack
pub mod pipeline_use_case;

// Load units back as tensors
pub mod inspect_use_case;
