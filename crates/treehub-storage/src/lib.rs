//! # treehub-storage
//!
//! The physical half of an owner's namespace: one directory per owner under
//! a shared root, with staged uploads, subtree moves, recursive deletes,
//! zip archives and tolerant size scans.

pub mod archive;
pub mod scan;
pub mod staging;
pub mod store;

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

pub use staging::StagedFile;
pub use store::PhysicalStore;

/// A byte stream type used for reading and writing file contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;
