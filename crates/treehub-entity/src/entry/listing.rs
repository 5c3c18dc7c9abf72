//! Browse-view structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use treehub_core::types::PathKey;

use super::model::Entry;

/// A direct child of a folder, as shown in a browse view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingItem {
    /// The index entry.
    #[serde(flatten)]
    pub entry: Entry,
    /// Last modification time of the physical object, if it could be read.
    pub modified_at: Option<DateTime<Utc>>,
}

/// One folder in the flattened folder tree used to pick move targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTreeItem {
    /// Folder path.
    pub path: PathKey,
    /// Folder name.
    pub name: String,
    /// Nesting level; top-level folders are 0.
    pub depth: usize,
}

impl FolderTreeItem {
    /// Indented display label, one level per two spaces.
    pub fn label(&self) -> String {
        format!("{}└─ {}", "  ".repeat(self.depth), self.name)
    }
}
