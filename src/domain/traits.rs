// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The application layer talks to sources and sinks through
// these traits, so tests can swap a directory of .xml.gz files
// or an output directory for an in-memory Vec.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::Path;

use anyhow::Result;

use crate::domain::abstract_record::Abstract;
use crate::domain::batch::PackedBatch;

// ─── AbstractSource ───────────────────────────────────────────────────────────
/// Any component that can pull abstracts out of one archive file.
///
/// Implementations:
///   - PubmedXmlLoader → gzip-compressed PubMed XML
pub trait AbstractSource: Sync {
    /// Every non-blank abstract in `path`, in document order.
    fn load_file(&self, path: &Path) -> Result<Vec<Abstract>>;
}

// ─── BatchSink ────────────────────────────────────────────────────────────────
/// Receives packed units in emission order.
///
/// Implementations:
///   - BatchStore       → one numbered file per unit
///   - Vec<PackedBatch> → in-memory, for tests
pub trait BatchSink {
    /// Persist one unit and return its index in this run.
    fn write(&mut self, batch: &PackedBatch) -> Result<usize>;
}

impl BatchSink for Vec<PackedBatch> {
    fn write(&mut self, batch: &PackedBatch) -> Result<usize> {
        self.push(batch.clone());
        Ok(self.len() - 1)
    }
}
