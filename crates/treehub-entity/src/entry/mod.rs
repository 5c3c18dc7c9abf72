//! Namespace index entries and the views built from them.

pub mod listing;
pub mod model;

pub use listing::{FolderTreeItem, ListingItem};
pub use model::Entry;
