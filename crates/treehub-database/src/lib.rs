//! # treehub-database
//!
//! SQLite connection management, schema migrations, and the
//! [`NamespaceIndex`] abstraction with its SQL implementation.

pub mod connection;
pub mod index;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use index::NamespaceIndex;
pub use repositories::entry::EntryRepository;
