//! # treehub-service
//!
//! Service layer for TreeHub. [`NamespaceService`] runs every subtree
//! mutation under a per-owner lock, physical tree first and index second,
//! and reports an index failure after a physical change as a partial
//! failure. The remaining services are read-only views, the operator
//! overview and the reconciliation pass that repairs such failures.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod admin;
pub mod context;
pub mod locks;
pub mod namespace;

pub use admin::{AdminService, Reconciler};
pub use context::ServiceContext;
pub use locks::OwnerLocks;
pub use namespace::{BrowseService, Download, NamespaceService};
