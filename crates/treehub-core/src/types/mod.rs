//! Core type definitions used across the TreeHub workspace.

pub mod id;
pub mod path;

pub use id::OwnerId;
pub use path::PathKey;
