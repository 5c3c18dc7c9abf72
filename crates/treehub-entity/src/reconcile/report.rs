//! Index/filesystem divergence report.

use serde::{Deserialize, Serialize};

use treehub_core::types::{OwnerId, PathKey};

/// A file whose cached size differs from the file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMismatch {
    /// File path.
    pub path: PathKey,
    /// Size recorded in the index.
    pub indexed: u64,
    /// Size found on disk.
    pub actual: u64,
}

/// Differences between one owner's index rows and physical tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// The owner that was scanned.
    pub owner_id: OwnerId,
    /// Physical objects with no index row.
    pub missing_in_index: Vec<PathKey>,
    /// Index rows with no physical object.
    pub missing_on_disk: Vec<PathKey>,
    /// Paths that are a folder in one store and a file in the other.
    pub kind_mismatches: Vec<PathKey>,
    /// Files whose cached size is stale.
    pub size_mismatches: Vec<SizeMismatch>,
    /// Whether the index was rewritten to match the filesystem.
    pub repaired: bool,
}

impl ReconcileReport {
    /// Create an empty report for an owner.
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            ..Self::default()
        }
    }

    /// Whether both stores agree completely.
    pub fn is_consistent(&self) -> bool {
        self.missing_in_index.is_empty()
            && self.missing_on_disk.is_empty()
            && self.kind_mismatches.is_empty()
            && self.size_mismatches.is_empty()
    }

    /// Total number of discrepancies found.
    pub fn discrepancy_count(&self) -> usize {
        self.missing_in_index.len()
            + self.missing_on_disk.len()
            + self.kind_mismatches.len()
            + self.size_mismatches.len()
    }
}
