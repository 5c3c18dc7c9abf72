//! Entry entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use treehub_core::types::{OwnerId, PathKey};

/// One tracked file or folder in an owner's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    /// The owning partition.
    pub owner_id: OwnerId,
    /// Normalized logical path, unique per owner.
    pub logical_path: PathKey,
    /// Whether this entry is a folder.
    pub is_folder: bool,
    /// Cached size of the underlying file; always 0 for folders.
    pub size_bytes: i64,
    /// Set once when the entry is created.
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Build a folder entry that exists only implicitly, as the common
    /// prefix of indexed descendants.
    pub fn implicit_folder(owner_id: OwnerId, logical_path: PathKey, created_at: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            logical_path,
            is_folder: true,
            size_bytes: 0,
            created_at,
        }
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.logical_path.name().unwrap_or_default()
    }

    /// Size as an unsigned byte count.
    pub fn size(&self) -> u64 {
        self.size_bytes.max(0) as u64
    }
}
