//! Physical object metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use treehub_core::types::{OwnerId, PathKey};

/// A file or directory found under an owner's root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalObject {
    /// Logical path derived from the location under the owner root.
    pub path: PathKey,
    /// Whether this is a directory.
    pub is_folder: bool,
    /// File length in bytes; 0 for directories.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified_at: Option<DateTime<Utc>>,
}

/// Summary of one owner's directory under the shared root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRoot {
    /// The owner the directory belongs to.
    pub owner_id: OwnerId,
    /// Recursive size of everything readable below the root.
    pub size_bytes: u64,
    /// Last modification time of the root directory itself.
    pub modified_at: Option<DateTime<Utc>>,
}

/// Admin view of one owner: physical footprint plus index size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    /// Physical directory summary. Owners known only to the index report
    /// a size of 0 and no modification time.
    #[serde(flatten)]
    pub root: OwnerRoot,
    /// Number of index entries for the owner.
    pub entry_count: u64,
}
