//! The namespace index abstraction.
//!
//! The index is the metadata half of an owner's namespace: one row per
//! tracked file or folder, keyed by `(owner, logical_path)`. Subtree
//! membership is always decided by [`PathKey::is_within`] semantics, never
//! by a bare string prefix.

use std::fmt::Debug;

use async_trait::async_trait;

use treehub_core::result::AppResult;
use treehub_core::types::{OwnerId, PathKey};
use treehub_entity::Entry;

/// Persistent index of logical paths per owner.
#[async_trait]
pub trait NamespaceIndex: Send + Sync + Debug + 'static {
    /// Look up a single entry. The owner root is never stored and yields `None`.
    async fn get(&self, owner: OwnerId, path: &PathKey) -> AppResult<Option<Entry>>;

    /// Direct children of `folder`, grouped by the first segment below it.
    ///
    /// A child with its own row is returned as stored; a child that only
    /// exists as the prefix of deeper rows is returned as a synthesized
    /// folder. Folders come first, then files, each ordered by name.
    async fn list_children(&self, owner: OwnerId, folder: &PathKey) -> AppResult<Vec<Entry>>;

    /// Every entry within `path`, including `path` itself, ordered by path.
    async fn list_subtree(&self, owner: OwnerId, path: &PathKey) -> AppResult<Vec<Entry>>;

    /// Insert a new entry, creating missing ancestor folders first.
    ///
    /// Fails with `Conflict` if the path is already indexed or one of its
    /// ancestors is indexed as a file.
    async fn create(
        &self,
        owner: OwnerId,
        path: &PathKey,
        is_folder: bool,
        size_bytes: u64,
    ) -> AppResult<Entry>;

    /// Insert a file entry or refresh the size of an existing one.
    ///
    /// Fails with `Conflict` if the path is indexed as a folder.
    async fn record_upload(&self, owner: OwnerId, path: &PathKey, size_bytes: u64)
    -> AppResult<Entry>;

    /// Atomically move every entry within `old_prefix` under `new_prefix`.
    ///
    /// Returns the number of rewritten rows. Fails with `NotFound` when
    /// nothing matches and with `Conflict` when a rewritten path collides
    /// with an existing one; in both cases the index is left untouched.
    async fn bulk_rewrite(
        &self,
        owner: OwnerId,
        old_prefix: &PathKey,
        new_prefix: &PathKey,
    ) -> AppResult<u64>;

    /// Atomically delete every entry within `path`. Returns the row count.
    async fn delete_subtree(&self, owner: OwnerId, path: &PathKey) -> AppResult<u64>;

    /// Overwrite the cached size of a file entry.
    async fn set_size(&self, owner: OwnerId, path: &PathKey, size_bytes: u64) -> AppResult<()>;

    /// Every owner that has at least one indexed entry.
    async fn owners(&self) -> AppResult<Vec<OwnerId>>;

    /// Number of entries indexed for `owner`.
    async fn count(&self, owner: OwnerId) -> AppResult<u64>;
}
