//! Namespace mutation and browsing services.

pub mod browse;
pub mod service;

pub use browse::{BrowseService, Download};
pub use service::NamespaceService;
