//! Repository implementations for TreeHub entities.

pub mod entry;

pub use entry::EntryRepository;
