//! Subtree operations that keep the namespace index and the physical tree
//! in step.
//!
//! Every mutation follows the same protocol:
//!
//! 1. normalize the caller's paths,
//! 2. take the owner lock and check both stores,
//! 3. mutate the physical tree,
//! 4. mutate the index.
//!
//! A failure in step 4 after step 3 succeeded is reported as
//! `PartialFailure` with a [`RepairHint`] and is never retried here.

use std::sync::Arc;

use tracing::{error, info, warn};

use treehub_core::error::{AppError, OperationKind, RepairHint};
use treehub_core::result::AppResult;
use treehub_core::types::{OwnerId, PathKey};
use treehub_database::NamespaceIndex;
use treehub_entity::Entry;
use treehub_storage::{ByteStream, PhysicalStore};

use crate::locks::OwnerLocks;

/// Orchestrates create, upload, move and delete across both stores.
#[derive(Debug, Clone)]
pub struct NamespaceService {
    /// Namespace index.
    index: Arc<dyn NamespaceIndex>,
    /// Physical owner trees.
    store: Arc<PhysicalStore>,
    /// Per-owner critical sections.
    locks: Arc<OwnerLocks>,
}

impl NamespaceService {
    /// Creates a new namespace service.
    pub fn new(
        index: Arc<dyn NamespaceIndex>,
        store: Arc<PhysicalStore>,
        locks: Arc<OwnerLocks>,
    ) -> Self {
        Self {
            index,
            store,
            locks,
        }
    }

    /// Create a folder and any missing ancestors in both stores.
    ///
    /// Succeeds without changes if the folder already exists as a folder in
    /// both stores. Any other pre-existing object at `path` is a `Conflict`.
    pub async fn create_folder(&self, owner: OwnerId, path: &str) -> AppResult<Entry> {
        let path = PathKey::normalize_non_root(path)?;
        let _guard = self.locks.lock(owner).await;

        let indexed = self.index.get(owner, &path).await?;
        let physical = self.store.try_stat(owner, &path).await?;
        match (indexed, physical) {
            (Some(entry), Some(object)) if entry.is_folder && object.is_folder => {
                return Ok(entry);
            }
            (None, None) => {}
            _ => {
                return Err(AppError::conflict(format!("'{path}' already exists")));
            }
        }
        self.check_ancestors(owner, &path).await?;

        self.store.create_folder(owner, &path).await?;

        let entry = self
            .index
            .create(owner, &path, true, 0)
            .await
            .map_err(|e| partial_failure(owner, OperationKind::CreateFolder, &path, None, e))?;

        info!(owner_id = %owner, path = %path, "Created folder");
        Ok(entry)
    }

    /// Store uploaded content at `path`, creating or overwriting one file.
    ///
    /// The content is staged before the owner lock is taken. If the upload
    /// fails or the returned future is dropped, the staged file is removed
    /// and no entry is recorded. The recorded size is the number of bytes
    /// actually written.
    pub async fn upload(&self, owner: OwnerId, path: &str, content: ByteStream) -> AppResult<Entry> {
        let path = PathKey::normalize_non_root(path)?;
        let staged = self.store.stage(content).await?;

        let _guard = self.locks.lock(owner).await;

        if self.index.get(owner, &path).await?.is_some_and(|e| e.is_folder) {
            return Err(AppError::conflict(format!("'{path}' is a folder")));
        }
        if self
            .store
            .try_stat(owner, &path)
            .await?
            .is_some_and(|o| o.is_folder)
        {
            return Err(AppError::conflict(format!("'{path}' is a folder")));
        }
        self.check_ancestors(owner, &path).await?;

        let size_bytes = self.store.commit_staged(owner, &path, staged).await?;

        let entry = self
            .index
            .record_upload(owner, &path, size_bytes)
            .await
            .map_err(|e| partial_failure(owner, OperationKind::Upload, &path, None, e))?;

        info!(owner_id = %owner, path = %path, size_bytes, "Uploaded file");
        Ok(entry)
    }

    /// Rename or move a file or folder subtree.
    ///
    /// Returns the number of index entries rewritten. The destination must
    /// not exist in either store, and the moved objects get a fresh
    /// modification time.
    pub async fn rename(&self, owner: OwnerId, from: &str, to: &str) -> AppResult<u64> {
        let from = PathKey::normalize_non_root(from)?;
        let to = PathKey::normalize_non_root(to)?;
        self.move_path(owner, from, to).await
    }

    /// Move `item` into `target_folder`, keeping its name. An empty target
    /// means the owner root.
    pub async fn move_into(&self, owner: OwnerId, item: &str, target_folder: &str) -> AppResult<u64> {
        let from = PathKey::normalize_non_root(item)?;
        let target = PathKey::normalize(target_folder)?;
        let name = from
            .name()
            .ok_or_else(|| AppError::invalid_path("cannot move the owner root"))?;
        let to = target.join(name)?;
        self.move_path(owner, from, to).await
    }

    async fn move_path(&self, owner: OwnerId, from: PathKey, to: PathKey) -> AppResult<u64> {
        if to.is_within(&from) {
            return Err(AppError::invalid_path(format!(
                "cannot move '{from}' into its own subtree '{to}'"
            )));
        }
        let _guard = self.locks.lock(owner).await;

        if !self.store.exists(owner, &from).await? {
            return Err(AppError::not_found(format!("Path not found: {from}")));
        }
        if self.index.get(owner, &from).await?.is_none() {
            return Err(AppError::not_found(format!("'{from}' is not indexed")));
        }
        if self.store.exists(owner, &to).await? || self.index.get(owner, &to).await?.is_some() {
            return Err(AppError::conflict(format!("Destination '{to}' already exists")));
        }
        self.check_ancestors(owner, &to).await?;

        self.store.move_or_rename(owner, &from, &to).await?;

        let rewritten = self
            .index
            .bulk_rewrite(owner, &from, &to)
            .await
            .map_err(|e| partial_failure(owner, OperationKind::Move, &from, Some(&to), e))?;

        info!(owner_id = %owner, from = %from, to = %to, count = rewritten, "Moved");
        Ok(rewritten)
    }

    /// Delete a file or folder subtree from both stores.
    ///
    /// Returns the number of index entries removed. A path missing from the
    /// physical tree fails with `NotFound` before the index is touched.
    pub async fn delete(&self, owner: OwnerId, path: &str) -> AppResult<u64> {
        let path = PathKey::normalize_non_root(path)?;
        let _guard = self.locks.lock(owner).await;

        self.store.delete(owner, &path).await?;

        let removed = self
            .index
            .delete_subtree(owner, &path)
            .await
            .map_err(|e| partial_failure(owner, OperationKind::Delete, &path, None, e))?;

        if removed == 0 {
            warn!(owner_id = %owner, path = %path, "Deleted a physical object that had no index entries");
        }
        info!(owner_id = %owner, path = %path, count = removed, "Deleted");
        Ok(removed)
    }

    /// Every ancestor of `path` must be a folder (or absent) in both stores.
    async fn check_ancestors(&self, owner: OwnerId, path: &PathKey) -> AppResult<()> {
        for ancestor in path.ancestors() {
            let indexed_file = self
                .index
                .get(owner, &ancestor)
                .await?
                .is_some_and(|e| !e.is_folder);
            let physical_file = self
                .store
                .try_stat(owner, &ancestor)
                .await?
                .is_some_and(|o| !o.is_folder);
            if indexed_file || physical_file {
                return Err(AppError::conflict(format!(
                    "Ancestor '{ancestor}' of '{path}' is a file"
                )));
            }
        }
        Ok(())
    }
}

/// Wrap an index failure that followed a successful physical mutation.
fn partial_failure(
    owner: OwnerId,
    operation: OperationKind,
    source: &PathKey,
    target: Option<&PathKey>,
    cause: AppError,
) -> AppError {
    let hint = RepairHint {
        owner_id: owner,
        operation,
        source: source.clone(),
        target: target.cloned(),
    };
    error!(
        owner_id = %owner,
        operation = %operation,
        from = %source,
        to = target.map(|t| t.to_string()).unwrap_or_default(),
        cause_kind = %cause.kind,
        error = %cause,
        "Index update failed after filesystem change; owner needs reconciliation"
    );
    AppError::partial_failure(hint, cause)
}
