//! Read-only views over an owner's namespace.

use std::sync::Arc;

use tracing::debug;

use treehub_core::error::AppError;
use treehub_core::result::AppResult;
use treehub_core::types::{OwnerId, PathKey};
use treehub_database::NamespaceIndex;
use treehub_entity::{Entry, FolderTreeItem, ListingItem, PhysicalObject};
use treehub_storage::archive::archive_name;
use treehub_storage::{ByteStream, PhysicalStore};

/// A file or archive ready to be streamed to a client.
pub struct Download {
    /// Suggested file name.
    pub file_name: String,
    /// Whether the stream is a zip archive of a folder.
    pub is_archive: bool,
    /// The content.
    pub stream: ByteStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("is_archive", &self.is_archive)
            .finish_non_exhaustive()
    }
}

/// Browse, tree and download queries.
#[derive(Debug, Clone)]
pub struct BrowseService {
    /// Namespace index.
    index: Arc<dyn NamespaceIndex>,
    /// Physical owner trees.
    store: Arc<PhysicalStore>,
}

impl BrowseService {
    /// Creates a new browse service.
    pub fn new(index: Arc<dyn NamespaceIndex>, store: Arc<PhysicalStore>) -> Self {
        Self { index, store }
    }

    /// Direct children of a folder, folders first, with physical mtimes.
    pub async fn list_children(&self, owner: OwnerId, folder: &str) -> AppResult<Vec<ListingItem>> {
        let folder = PathKey::normalize(folder)?;
        let children = self.index.list_children(owner, &folder).await?;

        if children.is_empty() && !folder.is_root() {
            match self.index.get(owner, &folder).await? {
                Some(entry) if !entry.is_folder => {
                    return Err(AppError::validation(format!("'{folder}' is not a folder")));
                }
                Some(_) => {}
                None => return Err(AppError::not_found(format!("Folder not found: {folder}"))),
            }
        }

        let mut items = Vec::with_capacity(children.len());
        for entry in children {
            let modified_at = self
                .store
                .try_stat(owner, &entry.logical_path)
                .await?
                .and_then(|o| o.modified_at);
            items.push(ListingItem { entry, modified_at });
        }
        Ok(items)
    }

    /// Every index entry within `path`.
    pub async fn list_subtree(&self, owner: OwnerId, path: &str) -> AppResult<Vec<Entry>> {
        let path = PathKey::normalize(path)?;
        self.index.list_subtree(owner, &path).await
    }

    /// All indexed folders, in path order, with their nesting depth.
    pub async fn folder_tree(&self, owner: OwnerId) -> AppResult<Vec<FolderTreeItem>> {
        let entries = self.index.list_subtree(owner, &PathKey::root()).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.is_folder)
            .map(|e| FolderTreeItem {
                name: e.name().to_string(),
                depth: e.logical_path.depth().saturating_sub(1),
                path: e.logical_path,
            })
            .collect())
    }

    /// Physical metadata of one object.
    pub async fn stat(&self, owner: OwnerId, path: &str) -> AppResult<PhysicalObject> {
        let path = PathKey::normalize(path)?;
        self.store.stat(owner, &path).await
    }

    /// Stream a file as-is, or a folder (including the owner root) as a zip.
    pub async fn download(&self, owner: OwnerId, path: &str) -> AppResult<Download> {
        let path = PathKey::normalize(path)?;
        let object = if path.is_root() {
            None
        } else {
            Some(self.store.stat(owner, &path).await?)
        };

        match object {
            Some(object) if !object.is_folder => {
                let stream = self.store.open_file(owner, &path).await?;
                Ok(Download {
                    file_name: path.name().unwrap_or_default().to_string(),
                    is_archive: false,
                    stream,
                })
            }
            _ => {
                debug!(owner_id = %owner, path = %path, "Building folder archive");
                let stream = self.store.zip_subtree(owner, &path).await?;
                Ok(Download {
                    file_name: archive_name(&path),
                    is_archive: true,
                    stream,
                })
            }
        }
    }

    /// Recursive size of `path` on disk.
    pub async fn dir_size(&self, owner: OwnerId, path: &str) -> AppResult<u64> {
        let path = PathKey::normalize(path)?;
        self.store.dir_size(owner, &path).await
    }
}
