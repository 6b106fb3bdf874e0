//! Text diffing for snapshot pairs
//!
//! Produces an ordered list of insert/delete/equal segments between two
//! snapshots. Concatenating the equal and delete segments reproduces the
//! old snapshot; concatenating the equal and insert segments reproduces the
//! new one.

mod cleanup;
pub mod engine;
pub mod segment;

pub use engine::DiffEngine;
pub use segment::{source_text, target_text, DiffSegment, Operation};

/// Convenience function to diff two snapshots with the default engine
pub fn diff_snapshots(before: &[u8], after: &[u8]) -> Vec<DiffSegment> {
    DiffEngine::default().diff(before, after)
}
