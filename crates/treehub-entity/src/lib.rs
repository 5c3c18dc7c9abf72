//! # treehub-entity
//!
//! Domain models for TreeHub. [`Entry`](entry::Entry) is the index row;
//! the remaining types are values produced by the physical store, the
//! browse views and the reconciliation pass.

pub mod entry;
pub mod physical;
pub mod reconcile;

pub use entry::{Entry, FolderTreeItem, ListingItem};
pub use physical::{OwnerRoot, OwnerSummary, PhysicalObject};
pub use reconcile::{ReconcileReport, SizeMismatch};
